//! Text normalization applied identically to subjects and match values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalize {
    pub trim: bool,
    pub collapse_whitespace: bool,
    pub lowercase: bool,
    /// Fold accented Latin letters to their base letter (`ação` → `acao`).
    pub strip_accents: bool,
}

impl Normalize {
    /// Every step enabled.
    pub fn all() -> Self {
        Self {
            trim: true,
            collapse_whitespace: true,
            lowercase: true,
            strip_accents: true,
        }
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, input: &str) -> String {
        let source = if self.trim { input.trim() } else { input };
        let mut out = if self.collapse_whitespace {
            let mut collapsed = String::with_capacity(source.len());
            let mut in_run = false;
            for c in source.chars() {
                if c.is_whitespace() {
                    if !in_run {
                        collapsed.push(' ');
                    }
                    in_run = true;
                } else {
                    collapsed.push(c);
                    in_run = false;
                }
            }
            collapsed
        } else {
            source.to_string()
        };
        if self.lowercase {
            out = out.to_lowercase();
        }
        if self.strip_accents {
            out = out.chars().map(fold_accent).collect();
        }
        out
    }
}

/// Map an accented Latin letter to its unaccented form.
pub fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'í' | 'ì' | 'î' | 'ï' | 'ī' | 'į' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' | 'Ī' | 'Į' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ő' => 'O',
        'ú' | 'ù' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'ç' | 'ć' | 'č' => 'c',
        'Ç' | 'Ć' | 'Č' => 'C',
        'ñ' | 'ń' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ň' => 'N',
        'ý' | 'ÿ' => 'y',
        'Ý' | 'Ÿ' => 'Y',
        'š' | 'ś' => 's',
        'Š' | 'Ś' => 'S',
        'ž' | 'ź' | 'ż' => 'z',
        'Ž' | 'Ź' | 'Ż' => 'Z',
        'ł' => 'l',
        'Ł' => 'L',
        'ř' => 'r',
        'Ř' => 'R',
        'ď' => 'd',
        'Ď' => 'D',
        'ť' => 't',
        'Ť' => 'T',
        other => other,
    }
}
