const KATAKANA_SHIFT: u32 = 0x60;

/// Marks used between name parts that carry no sound.
const SEPARATORS: &[char] = &[
    '・', '･', '、', '，', ',', '.', '。', '(', ')', '（', '）', '「', '」', '〔', '〕', '/', '／',
];

pub fn is_katakana(c: char) -> bool {
    matches!(c, '\u{30A1}'..='\u{30F6}' | '\u{30FD}' | '\u{30FE}')
}

pub fn is_hiragana(c: char) -> bool {
    matches!(c, '\u{3041}'..='\u{3096}' | '\u{309D}'..='\u{309F}')
}

/// Characters allowed in a final reading.
pub fn is_yomi_char(c: char) -> bool {
    is_hiragana(c) || c == 'ー'
}

/// Half-width katakana U+FF66..=U+FF9D in code point order.
const HALFWIDTH: [char; 56] = [
    'ヲ', 'ァ', 'ィ', 'ゥ', 'ェ', 'ォ', 'ャ', 'ュ', 'ョ', 'ッ', 'ー', 'ア', 'イ', 'ウ', 'エ', 'オ',
    'カ', 'キ', 'ク', 'ケ', 'コ', 'サ', 'シ', 'ス', 'セ', 'ソ', 'タ', 'チ', 'ツ', 'テ', 'ト', 'ナ',
    'ニ', 'ヌ', 'ネ', 'ノ', 'ハ', 'ヒ', 'フ', 'ヘ', 'ホ', 'マ', 'ミ', 'ム', 'メ', 'モ', 'ヤ', 'ユ',
    'ヨ', 'ラ', 'リ', 'ル', 'レ', 'ロ', 'ワ', 'ン',
];

fn voiced(c: char) -> Option<char> {
    match c {
        'ウ' => Some('ヴ'),
        'ワ' => Some('ヷ'),
        'ヲ' => Some('ヺ'),
        _ if "カキクケコサシスセソタチツテトハヒフヘホ".contains(c) => char::from_u32(c as u32 + 1),
        _ => None,
    }
}

fn semi_voiced(c: char) -> Option<char> {
    if "ハヒフヘホ".contains(c) {
        char::from_u32(c as u32 + 2)
    } else {
        None
    }
}

/// Half-width katakana to full width, joining the separate (semi-)voiced marks.
pub fn fold_halfwidth(s: &str) -> String {
    let mut out: Vec<char> = Vec::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\u{FF66}'..='\u{FF9D}' => out.push(HALFWIDTH[(c as u32 - 0xFF66) as usize]),
            '\u{FF9E}' | '\u{FF9F}' => {
                let joined = out.last().copied().and_then(|prev| {
                    if c == '\u{FF9E}' {
                        voiced(prev)
                    } else {
                        semi_voiced(prev)
                    }
                });
                match joined {
                    Some(j) => {
                        out.pop();
                        out.push(j);
                    }
                    None => out.push(if c == '\u{FF9E}' { '゛' } else { '゜' }),
                }
            }
            c => out.push(c),
        }
    }
    out.into_iter().collect()
}

pub fn katakana_to_hiragana(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in fold_halfwidth(s).chars() {
        match c {
            // no precomposed hiragana for these
            'ヷ' => out.push_str("ゔぁ"),
            'ヸ' => out.push_str("ゔぃ"),
            'ヹ' => out.push_str("ゔぇ"),
            'ヺ' => out.push_str("ゔぉ"),
            c if is_katakana(c) => out.push(char::from_u32(c as u32 - KATAKANA_SHIFT).unwrap_or(c)),
            c => out.push(c),
        }
    }
    out
}

/// Trim, fold katakana to hiragana and drop spacing and separator punctuation.
/// Anything else is left in place so validation can reject it.
pub fn normalize_reading(s: &str) -> String {
    katakana_to_hiragana(s.trim())
        .chars()
        .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
        .collect()
}

pub fn is_valid_yomi(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_yomi_char) && s.chars().any(is_hiragana)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_katakana() {
        assert_eq!(katakana_to_hiragana("スズキ イチロウ"), "すずき いちろう");
        assert_eq!(katakana_to_hiragana("ヴァン"), "ゔぁん");
        assert_eq!(katakana_to_hiragana("abc漢字"), "abc漢字");
        assert_eq!(katakana_to_hiragana("ヷヸヹヺ"), "ゔぁゔぃゔぇゔぉ");
    }

    #[test]
    fn folds_halfwidth_katakana() {
        assert_eq!(fold_halfwidth("ｽｽﾞｷ ｲﾁﾛｳ"), "スズキ イチロウ");
        assert_eq!(fold_halfwidth("ﾊﾟｰｸ ｳﾞｨ ｦﾞ"), "パーク ヴィ ヺ");
        // a mark with nothing to join stays visible
        assert_eq!(fold_halfwidth("ｱﾞ"), "ア゛");
        assert_eq!(normalize_reading("ｽｽﾞｷ ｲﾁﾛｳ"), "すずきいちろう");
        assert_eq!(normalize_reading("ﾏｲｹﾙ･ﾎﾟｰﾙ"), "まいけるぽーる");
    }

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize_reading("  やまだ　たろう "), "やまだたろう");
        assert_eq!(normalize_reading("スミス・ジョン"), "すみすじょん");
        assert_eq!(normalize_reading("（やまだ）"), "やまだ");
        assert_eq!(normalize_reading("マイケル・ジャクソン"), "まいけるじゃくそん");
        assert_eq!(normalize_reading("ケリー"), "けりー");
    }

    #[test]
    fn validity() {
        assert!(is_valid_yomi("すずきいちろう"));
        assert!(is_valid_yomi("けりー"));
        assert!(!is_valid_yomi(""));
        assert!(!is_valid_yomi("ー"));
        assert!(!is_valid_yomi("すずき一郎"));
        assert!(!is_valid_yomi("suzuki"));
    }
}
