//! Playback attributes encoded as trailing characters of an image alt text.
//!
//! ```text
//! ![A looping clip ~>=](clip.mp4)
//!                  ^^^
//!                  │││
//!                  ││└─ `=`  hide controls, play inline
//!                  │└── `>`  autoplay (muted)
//!                  └─── `~`  loop
//! ```

use crate::types::MediaAttributes;

const LOOP: char = '~';
const AUTOPLAY: char = '>';
const HIDE_CONTROLS: char = '=';

fn is_sigil(c: char) -> bool {
    matches!(c, LOOP | AUTOPLAY | HIDE_CONTROLS)
}

/// Strip sigils from `alt` and return the attributes they encode.
///
/// The trailing run of sigil characters is consumed, then at most one space.
/// Alt text without trailing sigils is returned unchanged with default
/// attributes.
pub fn decode_sigils(alt: &str) -> (String, MediaAttributes) {
    let mut attributes = MediaAttributes::default();
    let clean = alt.trim_end_matches(is_sigil);
    if clean.len() == alt.len() {
        return (alt.to_string(), attributes);
    }

    for sigil in alt[clean.len()..].chars() {
        match sigil {
            LOOP => attributes.looped = true,
            AUTOPLAY => {
                attributes.autoplay = true;
                attributes.muted = true;
            }
            HIDE_CONTROLS => {
                attributes.controls = false;
                attributes.playsinline = true;
            }
            _ => {}
        }
    }

    let clean = clean.strip_suffix(' ').unwrap_or(clean);
    (clean.to_string(), attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sigils_keeps_alt_and_defaults() {
        let (alt, attrs) = decode_sigils("A photo");
        assert_eq!(alt, "A photo");
        assert_eq!(attrs, MediaAttributes::default());
    }

    #[test]
    fn all_sigils_after_a_space() {
        let (alt, attrs) = decode_sigils("A clip ~>=");
        assert_eq!(alt, "A clip");
        assert_eq!(
            attrs,
            MediaAttributes {
                looped: true,
                autoplay: true,
                muted: true,
                playsinline: true,
                controls: false,
            }
        );
    }

    #[test]
    fn sigils_without_separating_space() {
        let (alt, attrs) = decode_sigils("a photo>");
        assert_eq!(alt, "a photo");
        assert!(attrs.autoplay && attrs.muted);
        assert!(attrs.controls);
        assert!(!attrs.looped);
    }

    #[test]
    fn order_and_duplicates_do_not_matter() {
        let (_, a) = decode_sigils("x =~>");
        let (_, b) = decode_sigils("x >>~==");
        assert_eq!(a, b);
    }

    #[test]
    fn only_one_separating_space_is_consumed() {
        let (alt, _) = decode_sigils("clip  ~");
        assert_eq!(alt, "clip ");
    }

    #[test]
    fn alt_made_only_of_sigils() {
        let (alt, attrs) = decode_sigils("~");
        assert_eq!(alt, "");
        assert!(attrs.looped);
    }

    #[test]
    fn sigils_in_the_middle_are_text() {
        let (alt, attrs) = decode_sigils("a > b");
        assert_eq!(alt, "a > b");
        assert_eq!(attrs, MediaAttributes::default());
    }
}
