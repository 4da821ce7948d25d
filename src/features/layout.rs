//! Layout features computed from raw text: whitespace usage, empty lines,
//! brace placement and indentation style.

use super::stats::rate;
use super::{Calculator, Category, Fragment, TextCalculator};

macro_rules! layout_calculator {
    ($ty:ident, $ns:literal) => {
        impl Calculator for $ty {
            fn namespace(&self) -> &'static str {
                $ns
            }

            fn category(&self) -> Category {
                Category::Layout
            }
        }
    };
}

fn char_rate(text: &str, target: char) -> f64 {
    let mut length = 0;
    let mut count = 0;
    for c in text.chars() {
        length += 1;
        if c == target {
            count += 1;
        }
    }
    rate(count, length)
}

/// `1.0` when `yes` wins the vote, `0.0` otherwise, NaN without votes.
fn majority(yes: usize, no: usize) -> f64 {
    if yes + no == 0 {
        f64::NAN
    } else if yes > no {
        1.0
    } else {
        0.0
    }
}

pub struct NumTabs;
layout_calculator!(NumTabs, "num_tabs");

impl TextCalculator for NumTabs {
    fn calculate(&self, text: &str) -> Fragment {
        Fragment::scalar(self.namespace(), char_rate(text, '\t'))
    }
}

pub struct NumSpaces;
layout_calculator!(NumSpaces, "num_spaces");

impl TextCalculator for NumSpaces {
    fn calculate(&self, text: &str) -> Fragment {
        Fragment::scalar(self.namespace(), char_rate(text, ' '))
    }
}

/// Whitespace-only lines per character.
pub struct NumEmptyLines;
layout_calculator!(NumEmptyLines, "num_empty_lines");

impl TextCalculator for NumEmptyLines {
    fn calculate(&self, text: &str) -> Fragment {
        let empty = text.lines().filter(|l| l.trim().is_empty()).count();
        Fragment::scalar(self.namespace(), rate(empty, text.chars().count()))
    }
}

/// Whitespace characters per non-whitespace character.
pub struct WhiteSpaceRatio;
layout_calculator!(WhiteSpaceRatio, "whitespace_ratio");

impl TextCalculator for WhiteSpaceRatio {
    fn calculate(&self, text: &str) -> Fragment {
        let (ws, other) = text.chars().fold((0, 0), |(ws, other), c| {
            if c.is_whitespace() {
                (ws + 1, other)
            } else {
                (ws, other + 1)
            }
        });
        Fragment::scalar(self.namespace(), rate(ws, other))
    }
}

/// Whether most opening braces start their own line (Allman style).
pub struct NewLineBeforeOpenBrace;
layout_calculator!(NewLineBeforeOpenBrace, "new_line_before_open_brace");

impl TextCalculator for NewLineBeforeOpenBrace {
    fn calculate(&self, text: &str) -> Fragment {
        let mut own_line = 0;
        let mut same_line = 0;
        for line in text.lines() {
            let mut leading = true;
            for c in line.chars() {
                if c == '{' {
                    if leading {
                        own_line += 1;
                    } else {
                        same_line += 1;
                    }
                }
                if !c.is_whitespace() {
                    leading = false;
                }
            }
        }
        Fragment::scalar(self.namespace(), majority(own_line, same_line))
    }
}

/// Whether most indented lines are indented with a tab.
pub struct TabsLeadLines;
layout_calculator!(TabsLeadLines, "tabs_lead_lines");

impl TextCalculator for TabsLeadLines {
    fn calculate(&self, text: &str) -> Fragment {
        let mut tabs = 0;
        let mut spaces = 0;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match line.chars().next() {
                Some('\t') => tabs += 1,
                Some(' ') => spaces += 1,
                _ => {}
            }
        }
        Fragment::scalar(self.namespace(), majority(tabs, spaces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tabs_and_spaces() {
        let text = "\tint x;\n  y";
        assert_eq!(NumTabs.calculate(text).get("num_tabs"), Some(rate(1, 11)));
        assert_eq!(NumSpaces.calculate(text).get("num_spaces"), Some(rate(3, 11)));
        assert!(NumTabs.calculate("").get("num_tabs").unwrap().is_nan());
    }

    #[test]
    fn test_empty_lines() {
        let text = "a\n\n   \nb";
        assert_eq!(
            NumEmptyLines.calculate(text).get("num_empty_lines"),
            Some(rate(2, 8))
        );
    }

    #[test]
    fn test_whitespace_ratio() {
        assert_eq!(
            WhiteSpaceRatio.calculate("a b\nc").get("whitespace_ratio"),
            Some(2.0 / 3.0)
        );
        assert!(WhiteSpaceRatio
            .calculate("   ")
            .get("whitespace_ratio")
            .unwrap()
            .is_nan());
    }

    #[test]
    fn test_brace_placement() {
        let allman = "class A\n{\n  void f()\n  {\n  }\n}";
        let knr = "class A {\n  void f() {\n  }\n}";
        let ns = "new_line_before_open_brace";
        assert_eq!(NewLineBeforeOpenBrace.calculate(allman).get(ns), Some(1.0));
        assert_eq!(NewLineBeforeOpenBrace.calculate(knr).get(ns), Some(0.0));
        assert!(NewLineBeforeOpenBrace.calculate("x").get(ns).unwrap().is_nan());
    }

    #[test]
    fn test_tabs_lead_lines() {
        let ns = "tabs_lead_lines";
        assert_eq!(TabsLeadLines.calculate("a\n\tb\n\tc\n  d").get(ns), Some(1.0));
        assert_eq!(TabsLeadLines.calculate("a\n  b\n\tc").get(ns), Some(0.0));
        assert!(TabsLeadLines.calculate("a\nb").get(ns).unwrap().is_nan());
    }
}
