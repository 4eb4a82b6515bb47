//! `xsl:number`: counting nodes and rendering the counts.
//!
//! The format string alternates alphanumeric tokens (numeric formats) and
//! punctuation runs (separators). When there are more numbers than numeric
//! tokens, the last numeric token is reused with a `.` separator.

use super::pattern::CompiledMatch;
use crate::dom::Node;

/// Formats a list of counts against a format string.
pub fn format_numbers(numbers: &[i64], format: &str) -> String {
    let format = if format.is_empty() { "1" } else { format };
    let tokens = parse_format_string(format);
    if tokens.is_empty() {
        return numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
    }

    // the last numeric token, reused for overflow numbers
    let last_num = match tokens.iter().rposition(|t| t.is_number) {
        Some(i) => i,
        None => {
            // punctuation-only format: decimal numbers, token as suffix
            let mut out = numbers
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(".");
            out.push_str(&tokens[0].text);
            return out;
        }
    };

    let mut out = String::new();
    let mut ti = 0usize;
    for (i, &n) in numbers.iter().enumerate() {
        let mut tok = if i > 0 && ti >= last_num {
            out.push('.');
            &tokens[last_num]
        } else {
            &tokens[ti]
        };
        if !tok.is_number {
            out.push_str(&tok.text);
            ti += 1;
            tok = tokens.get(ti).unwrap_or(&tokens[last_num]);
        }
        if tok.is_number {
            out.push_str(&format_number(n, &tok.text));
        } else {
            out.push_str(&tok.text);
        }
        ti += 1;
    }
    if let Some(suffix) = tokens.last() {
        if !suffix.is_number {
            out.push_str(&suffix.text);
        }
    }
    out
}

struct FormatToken {
    text: String,
    is_number: bool,
}

fn parse_format_string(format: &str) -> Vec<FormatToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_number = false;
    for c in format.chars() {
        let number_char = c.is_alphanumeric();
        if !current.is_empty() && number_char != in_number {
            tokens.push(FormatToken {
                text: std::mem::take(&mut current),
                is_number: in_number,
            });
        }
        in_number = number_char;
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(FormatToken {
            text: current,
            is_number: in_number,
        });
    }
    tokens
}

/// Renders one number in the style named by a format token.
pub fn format_number(n: i64, token: &str) -> String {
    if token == "Ww" {
        return title_case(&to_words(n));
    }
    match token.chars().next() {
        Some('0') => format!("{:0width$}", n, width = token.len()),
        Some('I') => to_roman(n),
        Some('i') => to_roman(n).to_lowercase(),
        Some('A') => to_alpha(n).to_uppercase(),
        Some('a') => to_alpha(n),
        Some('W') => to_words(n).to_uppercase(),
        Some('w') => to_words(n),
        _ => n.to_string(),
    }
}

const ROMAN_MAP: &[(&str, i64)] = &[
    ("M", 1000),
    ("CM", 900),
    ("D", 500),
    ("CD", 400),
    ("C", 100),
    ("XC", 90),
    ("L", 50),
    ("XL", 40),
    ("X", 10),
    ("IX", 9),
    ("V", 5),
    ("IV", 4),
    ("I", 1),
];

fn to_roman(n: i64) -> String {
    let mut out = String::new();
    let mut w = n;
    for &(letter, value) in ROMAN_MAP {
        while w >= value {
            out.push_str(letter);
            w -= value;
        }
    }
    out
}

/// Bijective base-26: 1 is `a`, 26 is `z`, 27 is `aa`.
fn to_alpha(n: i64) -> String {
    if n < 1 {
        return n.to_string();
    }
    let mut out = Vec::new();
    let mut w = n;
    while w > 0 {
        w -= 1;
        out.push((b'a' + (w % 26) as u8) as char);
        w /= 26;
    }
    out.reverse();
    out.into_iter().collect()
}

const UNITS: &[&str] = &[
    "", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];
const TEENS: &[&str] = &[
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];
const TENS: &[&str] = &[
    "", "ten", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];
const THOUSANDS: &[&str] = &["", "thousand", "million", "billion", "trillion", "quadrillion"];

fn to_words(n: i64) -> String {
    if n == 0 {
        return "zero".to_string();
    }
    if n < 0 {
        return format!("minus {}", to_words(-n));
    }
    let mut groups = Vec::new();
    let mut w = n;
    while w > 0 {
        groups.push((w % 1000) as usize);
        w /= 1000;
    }
    let mut words: Vec<String> = Vec::new();
    for (i, &group) in groups.iter().enumerate().rev() {
        if group == 0 {
            continue;
        }
        let mut part: Vec<String> = Vec::new();
        let (h, rest) = (group / 100, group % 100);
        if h > 0 {
            part.push(UNITS[h].to_string());
            part.push("hundred".to_string());
        }
        if rest >= 10 && rest < 20 {
            part.push(TEENS[rest - 10].to_string());
        } else {
            if rest >= 20 {
                part.push(TENS[rest / 10].to_string());
            }
            if rest % 10 > 0 {
                part.push(UNITS[rest % 10].to_string());
            }
        }
        if i > 0 {
            part.push(THOUSANDS.get(i).copied().unwrap_or("").to_string());
        }
        words.extend(part);
    }
    words.retain(|w| !w.is_empty());
    words.join(" ")
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn matches_one(node: &Node, patterns: &[CompiledMatch]) -> bool {
    patterns.iter().any(|m| m.matches(node, "", None))
}

/// Walks ancestor-or-self until the `count` pattern matches.
pub fn find_target(node: &Node, count: &[CompiledMatch]) -> Option<Node> {
    let mut cur = Some(node.clone());
    while let Some(n) = cur {
        if matches_one(&n, count) {
            return Some(n);
        }
        cur = n.parent();
    }
    None
}

/// Counts nodes matching `count` at and before `node`, stopping at a `from`
/// match. For `level="any"` the walk follows the preceding axis: previous
/// sibling, then its last-descendant chain, then the parent.
pub fn count_nodes(
    any_level: bool,
    node: Option<&Node>,
    count: &[CompiledMatch],
    from: &[CompiledMatch],
) -> i64 {
    let mut num = 0;
    let mut cur = node.cloned();
    while let Some(n) = cur {
        if matches_one(&n, count) {
            num += 1;
        }
        if !from.is_empty() && matches_one(&n, from) {
            break;
        }

        let mut prev = n.previous_sibling();
        if any_level {
            if let Some(ref mut p) = prev {
                while let Some(last) = p.last_child() {
                    *p = last;
                }
            }
            if prev.is_none() {
                prev = n.parent();
            }
        }
        cur = prev;
    }
    num
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_str;
    use crate::xslt::pattern::compile_match;

    #[test]
    fn single_number_formats() {
        assert_eq!(format_numbers(&[5], "1"), "5");
        assert_eq!(format_numbers(&[5], "1."), "5.");
        assert_eq!(format_numbers(&[5], "(1)"), "(5)");
        assert_eq!(format_numbers(&[7], "001"), "007");
        assert_eq!(format_numbers(&[4], "I"), "IV");
        assert_eq!(format_numbers(&[1949], "i"), "mcmxlix");
        assert_eq!(format_numbers(&[2], "A."), "B.");
        assert_eq!(format_numbers(&[27], "a"), "aa");
        assert_eq!(format_numbers(&[702], "a"), "zz");
        assert_eq!(format_numbers(&[21], "w"), "twenty one");
        assert_eq!(format_numbers(&[1100], "W"), "ONE THOUSAND ONE HUNDRED");
        assert_eq!(format_numbers(&[15], "Ww"), "Fifteen");
    }

    #[test]
    fn multi_level_formats() {
        assert_eq!(format_numbers(&[5, 2], "1.A"), "5.B");
        assert_eq!(format_numbers(&[5, 2, 3], "1.A.i>"), "5.B.iii>");
        // more numbers than numeric tokens: reuse the last token with '.'
        assert_eq!(format_numbers(&[5, 2], "1"), "5.2");
        assert_eq!(format_numbers(&[3, 1, 4], "1."), "3.1.4.");
    }

    #[test]
    fn unknown_token_falls_back_to_decimal() {
        assert_eq!(format_numbers(&[9], "%"), "9%");
        assert_eq!(format_number(9, "あ"), "9");
    }

    #[test]
    fn counts_like_named_siblings() {
        let doc = parse_str("<list><item/><item/><item/></list>", None).unwrap();
        let second = doc.root_element().unwrap().children()[1].clone();
        let count = compile_match("item", None, "", None, None);
        let target = find_target(&second, &count).unwrap();
        assert_eq!(count_nodes(false, Some(&target), &count, &[]), 2);
    }

    #[test]
    fn any_level_counts_across_subtrees() {
        let doc =
            parse_str("<d><s><n/><n/></s><s><n/><x><n/></x></s></d>", None).unwrap();
        // last <n/>: inside <x/> in the second <s/>
        let last = doc.root_element().unwrap().children()[1].children()[1].children()[0].clone();
        let count = compile_match("n", None, "", None, None);
        assert_eq!(count_nodes(true, Some(&last), &count, &[]), 4);
        let from = compile_match("s", None, "", None, None);
        assert_eq!(count_nodes(true, Some(&last), &count, &from), 2);
    }
}
