use std::collections::{BTreeMap, HashMap};

/// Full party names mapped to the short labels used in the roster.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("自民党", "自民"),
    ("自由民主党", "自民"),
    ("立憲民主党", "立憲"),
    ("日本維新の会", "維新"),
    ("日本共産党", "共産"),
    ("れいわ新選組", "れいわ"),
    ("日本保守党", "日保"),
    ("無所属連合", "諸派"),
    ("その他", "諸派"),
    ("無所属", "無所属"),
    ("公明党", "公明"),
    ("社民党", "社民"),
    ("社会民主党", "社民"),
    ("国民民主党", "国民"),
    ("参政党", "参政"),
    ("みんなでつくる党", "みんつく"),
    ("NHK党", "N国"),
    ("再生の道", "再道"),
    ("チームみらい", "みらい"),
    ("日本改革党", "日改"),
];

/// Party label normalization for one source.
///
/// Keys are compared with ASCII case folded, so `nhk党` and `NHK党` are the same alias.
#[derive(Debug, Clone, Default)]
pub struct PartyAliases {
    map: HashMap<String, String>,
}

impl PartyAliases {
    pub fn new(use_defaults: bool, overrides: &BTreeMap<String, String>) -> Self {
        let mut map = HashMap::new();
        if use_defaults {
            for (from, to) in DEFAULT_ALIASES {
                map.insert(from.to_ascii_lowercase(), to.to_string());
            }
        }
        for (from, to) in overrides {
            map.insert(from.to_ascii_lowercase(), to.clone());
        }
        PartyAliases { map }
    }

    pub fn normalize(&self, party: &str) -> String {
        let trimmed = party.trim();
        self.map
            .get(&trimmed.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_shorten_full_names() {
        let aliases = PartyAliases::new(true, &BTreeMap::new());
        assert_eq!(aliases.normalize("自民党"), "自民");
        assert_eq!(aliases.normalize(" 立憲民主党 "), "立憲");
        assert_eq!(aliases.normalize("NHK党"), "N国");
        assert_eq!(aliases.normalize("新党あおぞら"), "新党あおぞら");
    }

    #[test]
    fn overrides_win_and_defaults_can_be_disabled() {
        let mut overrides = BTreeMap::new();
        overrides.insert("自民党".to_string(), "自由民主党".to_string());
        let aliases = PartyAliases::new(true, &overrides);
        assert_eq!(aliases.normalize("自民党"), "自由民主党");

        let bare = PartyAliases::new(false, &BTreeMap::new());
        assert_eq!(bare.normalize("公明党"), "公明党");
    }
}
