//! # Format Vocabulary
//!
//! Bitmasks and enums shared by text and element nodes. Text formats and
//! details are stored as `u32` bitmasks so that they serialize as plain
//! numbers; modes, alignments and directions serialize as lowercase strings.

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const IS_BOLD: u32 = 1;
pub const IS_ITALIC: u32 = 1 << 1;
pub const IS_STRIKETHROUGH: u32 = 1 << 2;
pub const IS_UNDERLINE: u32 = 1 << 3;
pub const IS_CODE: u32 = 1 << 4;
pub const IS_SUBSCRIPT: u32 = 1 << 5;
pub const IS_SUPERSCRIPT: u32 = 1 << 6;
pub const IS_HIGHLIGHT: u32 = 1 << 7;
pub const IS_LOWERCASE: u32 = 1 << 8;
pub const IS_UPPERCASE: u32 = 1 << 9;
pub const IS_CAPITALIZE: u32 = 1 << 10;

/// Text detail bits
pub const IS_DIRECTIONLESS: u32 = 1;
pub const IS_UNMERGEABLE: u32 = 1 << 1;

/// A single text format flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextFormatType {
    Bold,
    Italic,
    Strikethrough,
    Underline,
    Code,
    Subscript,
    Superscript,
    Highlight,
    Lowercase,
    Uppercase,
    Capitalize,
}

impl TextFormatType {
    pub const ALL: [TextFormatType; 11] = [
        TextFormatType::Bold,
        TextFormatType::Italic,
        TextFormatType::Strikethrough,
        TextFormatType::Underline,
        TextFormatType::Code,
        TextFormatType::Subscript,
        TextFormatType::Superscript,
        TextFormatType::Highlight,
        TextFormatType::Lowercase,
        TextFormatType::Uppercase,
        TextFormatType::Capitalize,
    ];

    /// Lowercase name, the inverse of `FromStr`
    pub fn name(self) -> &'static str {
        match self {
            TextFormatType::Bold => "bold",
            TextFormatType::Italic => "italic",
            TextFormatType::Strikethrough => "strikethrough",
            TextFormatType::Underline => "underline",
            TextFormatType::Code => "code",
            TextFormatType::Subscript => "subscript",
            TextFormatType::Superscript => "superscript",
            TextFormatType::Highlight => "highlight",
            TextFormatType::Lowercase => "lowercase",
            TextFormatType::Uppercase => "uppercase",
            TextFormatType::Capitalize => "capitalize",
        }
    }

    /// Every flag set in `format`, in bit order
    pub fn flags(format: u32) -> Vec<TextFormatType> {
        Self::ALL.into_iter().filter(|flag| flag.is_set(format)).collect()
    }

    pub fn bit(self) -> u32 {
        match self {
            TextFormatType::Bold => IS_BOLD,
            TextFormatType::Italic => IS_ITALIC,
            TextFormatType::Strikethrough => IS_STRIKETHROUGH,
            TextFormatType::Underline => IS_UNDERLINE,
            TextFormatType::Code => IS_CODE,
            TextFormatType::Subscript => IS_SUBSCRIPT,
            TextFormatType::Superscript => IS_SUPERSCRIPT,
            TextFormatType::Highlight => IS_HIGHLIGHT,
            TextFormatType::Lowercase => IS_LOWERCASE,
            TextFormatType::Uppercase => IS_UPPERCASE,
            TextFormatType::Capitalize => IS_CAPITALIZE,
        }
    }

    /// Toggle this flag in `format`.
    ///
    /// Subscript and superscript are mutually exclusive, as are the three
    /// case transforms: turning one on clears the others.
    pub fn toggle(self, format: u32) -> u32 {
        let bit = self.bit();
        let mut next = format ^ bit;
        if next & bit != 0 {
            let exclusive = match self {
                TextFormatType::Subscript => IS_SUPERSCRIPT,
                TextFormatType::Superscript => IS_SUBSCRIPT,
                TextFormatType::Lowercase => IS_UPPERCASE | IS_CAPITALIZE,
                TextFormatType::Uppercase => IS_LOWERCASE | IS_CAPITALIZE,
                TextFormatType::Capitalize => IS_LOWERCASE | IS_UPPERCASE,
                _ => 0,
            };
            next &= !exclusive;
        }
        next
    }

    pub fn is_set(self, format: u32) -> bool {
        format & self.bit() != 0
    }
}

impl FromStr for TextFormatType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "bold" => TextFormatType::Bold,
            "italic" => TextFormatType::Italic,
            "strikethrough" => TextFormatType::Strikethrough,
            "underline" => TextFormatType::Underline,
            "code" => TextFormatType::Code,
            "subscript" => TextFormatType::Subscript,
            "superscript" => TextFormatType::Superscript,
            "highlight" => TextFormatType::Highlight,
            "lowercase" => TextFormatType::Lowercase,
            "uppercase" => TextFormatType::Uppercase,
            "capitalize" => TextFormatType::Capitalize,
            other => return Err(CommonError::UnknownTextFormat(other.to_string())),
        })
    }
}

/// How a text node behaves under editing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Normal,
    /// Edited as an atomic unit
    Token,
    /// Deleted segment by segment (space separated)
    Segmented,
    /// Not editable at all
    Inert,
}

impl FromStr for TextMode {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "normal" => TextMode::Normal,
            "token" => TextMode::Token,
            "segmented" => TextMode::Segmented,
            "inert" => TextMode::Inert,
            other => return Err(CommonError::UnknownTextMode(other.to_string())),
        })
    }
}

/// Block alignment of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementFormatType {
    #[default]
    #[serde(rename = "")]
    Unset,
    Left,
    Start,
    Center,
    Right,
    End,
    Justify,
}

impl FromStr for ElementFormatType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" => ElementFormatType::Unset,
            "left" => ElementFormatType::Left,
            "start" => ElementFormatType::Start,
            "center" => ElementFormatType::Center,
            "right" => ElementFormatType::Right,
            "end" => ElementFormatType::End,
            "justify" => ElementFormatType::Justify,
            other => return Err(CommonError::UnknownElementFormat(other.to_string())),
        })
    }
}

/// Writing direction of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl FromStr for Direction {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ltr" => Ok(Direction::Ltr),
            "rtl" => Ok(Direction::Rtl),
            other => Err(CommonError::UnknownDirection(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_sets_and_clears() {
        let format = TextFormatType::Bold.toggle(0);
        assert_eq!(format, IS_BOLD);
        assert_eq!(TextFormatType::Bold.toggle(format), 0);
    }

    #[test]
    fn test_subscript_clears_superscript() {
        let format = TextFormatType::Superscript.toggle(IS_BOLD);
        let format = TextFormatType::Subscript.toggle(format);
        assert!(TextFormatType::Subscript.is_set(format));
        assert!(!TextFormatType::Superscript.is_set(format));
        assert!(TextFormatType::Bold.is_set(format));
    }

    #[test]
    fn test_case_transforms_are_exclusive() {
        let format = TextFormatType::Uppercase.toggle(0);
        let format = TextFormatType::Capitalize.toggle(format);
        assert_eq!(format, IS_CAPITALIZE);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        for mode in [TextMode::Normal, TextMode::Token, TextMode::Segmented, TextMode::Inert] {
            let json = serde_json::to_string(&mode).unwrap();
            let back: TextMode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, mode);
        }
        assert_eq!(serde_json::to_string(&TextMode::Token).unwrap(), "\"token\"");
    }

    #[test]
    fn test_unset_element_format_is_empty_string() {
        assert_eq!(serde_json::to_string(&ElementFormatType::Unset).unwrap(), "\"\"");
        assert_eq!("center".parse::<ElementFormatType>().unwrap(), ElementFormatType::Center);
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        assert_eq!(
            "blink".parse::<TextFormatType>(),
            Err(CommonError::UnknownTextFormat("blink".to_string()))
        );
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_names_parse_back() {
        for flag in TextFormatType::ALL {
            assert_eq!(flag.name().parse::<TextFormatType>(), Ok(flag));
        }
        assert_eq!(
            TextFormatType::flags(IS_BOLD | IS_CODE),
            vec![TextFormatType::Bold, TextFormatType::Code]
        );
    }
}
