//! Font family classification
//!
//! Membership tests that tell built-in families from remotely hosted ones.
//! Anything in neither set is assumed to be a user upload.

use crate::types::FontSource;

/// Families every rendering target ships with
const WEB_SAFE_FONTS: &[&str] = &[
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Times",
    "Courier New",
    "Courier",
    "Verdana",
    "Georgia",
    "Palatino",
    "Garamond",
    "Bookman",
    "Tahoma",
    "Trebuchet MS",
    "Arial Black",
    "Impact",
    "Comic Sans MS",
    "serif",
    "sans-serif",
    "monospace",
];

/// Curated families served by the remote font service
const REMOTE_FONTS: &[&str] = &[
    "Roboto",
    "Roboto Condensed",
    "Roboto Mono",
    "Roboto Slab",
    "Open Sans",
    "Lato",
    "Montserrat",
    "Oswald",
    "Source Sans 3",
    "Source Serif 4",
    "Source Code Pro",
    "Raleway",
    "PT Sans",
    "PT Serif",
    "Merriweather",
    "Noto Sans",
    "Noto Serif",
    "Ubuntu",
    "Ubuntu Mono",
    "Playfair Display",
    "Poppins",
    "Nunito",
    "Nunito Sans",
    "Inter",
    "Work Sans",
    "Fira Sans",
    "Fira Code",
    "Rubik",
    "Mukta",
    "Quicksand",
    "Karla",
    "Libre Baskerville",
    "Libre Franklin",
    "Crimson Text",
    "EB Garamond",
    "Lora",
    "Bitter",
    "Cabin",
    "Arimo",
    "Tinos",
    "Cousine",
    "Josefin Sans",
    "Barlow",
    "Dosis",
    "Titillium Web",
    "Inconsolata",
    "IBM Plex Sans",
    "IBM Plex Serif",
    "IBM Plex Mono",
    "DM Sans",
    "DM Serif Display",
    "Manrope",
    "Archivo",
    "Heebo",
    "Oxygen",
    "Anton",
    "Bebas Neue",
    "Pacifico",
    "Dancing Script",
    "Caveat",
];

fn contains_ignore_case(set: &[&str], family: &str) -> bool {
    let family = family.trim();
    set.iter().any(|known| known.eq_ignore_ascii_case(family))
}

/// Whether `family` is built into the renderer
pub fn is_web_safe(family: &str) -> bool {
    contains_ignore_case(WEB_SAFE_FONTS, family)
}

/// Whether `family` is available from the remote font service
pub fn is_remote(family: &str) -> bool {
    contains_ignore_case(REMOTE_FONTS, family)
}

/// Best-guess source for a family with no other context
pub fn classify(family: &str) -> FontSource {
    if is_web_safe(family) {
        FontSource::WebSafe
    } else if is_remote(family) {
        FontSource::Remote
    } else {
        FontSource::Custom
    }
}

/// All built-in families
pub fn web_safe_fonts() -> &'static [&'static str] {
    WEB_SAFE_FONTS
}

/// All remotely hosted families
pub fn remote_fonts() -> &'static [&'static str] {
    REMOTE_FONTS
}
