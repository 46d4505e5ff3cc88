//! Locator strategies for one BASIC panel.
//!
//! Each strategy reads the currently rendered panel and returns whatever it
//! can find. [`locate`] runs them in order and fills the missing fields from
//! later strategies until both values are known.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::debug;

use super::observer::active_heading;
use super::page::{element_text, is_visible, visible_text, Document};
use crate::model::safety::{valid_basic_score, valid_percentile};
use crate::model::BasicMeasure;
use crate::parser::safety::measure_in;

static HEADING_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2, h3, h4").unwrap());
static DIV_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").unwrap());
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)%").unwrap());
static BARE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").unwrap());

const PERCENTILE_LABEL: &str = "CSA Percentile";
const SCORE_LABEL: &str = "BASIC Score";
/// The ELD card also carries percentile-like figures.
const SECTION_EXCLUDE: &str = "ELD Connection";
const MAX_SECTION_DEPTH: usize = 10;

const HIGHLIGHT_CLASSES: [&str; 4] = ["text-yellow-400", "text-yellow-500", "text-yellow-600", "text-lg"];
const HIGHLIGHT_COLORS: [&str; 4] = ["rgb(234,179,8)", "rgb(250,204,21)", "rgb(251,191,36)", "rgb(248,198,23)"];

/// One way of reading the active panel's values.
pub trait LocatorStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn locate(&self, doc: &Document) -> BasicMeasure;
}

/// Highlight-styled value next to its label.
pub struct HighlightLabel;

/// Label patterns over the text of the enclosing safety section.
pub struct SectionPattern;

/// Label patterns over the whole visible document.
pub struct DocumentPattern;

pub fn default_cascade() -> Vec<Box<dyn LocatorStrategy>> {
    vec![Box::new(HighlightLabel), Box::new(SectionPattern), Box::new(DocumentPattern)]
}

/// Run `cascade` in order, keeping the first value found for each field.
pub fn locate(cascade: &[Box<dyn LocatorStrategy>], doc: &Document) -> BasicMeasure {
    let mut found = BasicMeasure::default();
    for strategy in cascade {
        if found.percentile.is_some() && found.score.is_some() {
            break;
        }
        let m = strategy.locate(doc);
        debug!(strategy = strategy.name(), percentile = ?m.percentile, score = ?m.score, "locator attempt");
        found.percentile = found.percentile.or(m.percentile);
        found.score = found.score.or(m.score);
    }
    found
}

// ── Strategies ──

impl LocatorStrategy for HighlightLabel {
    fn name(&self) -> &'static str {
        "highlight"
    }

    fn locate(&self, doc: &Document) -> BasicMeasure {
        let Some(section) = safety_section(doc) else {
            return BasicMeasure::default();
        };
        BasicMeasure {
            percentile: highlighted(section, PERCENTILE_LABEL, |t| {
                PERCENT_RE.captures(t).and_then(|c| c[1].parse::<f64>().ok()).filter(|p| valid_percentile(*p))
            })
            .or_else(|| label_parent_text(section, PERCENTILE_LABEL).and_then(|t| measure_in(&t).percentile)),
            score: highlighted(section, SCORE_LABEL, |t| {
                BARE_NUMBER_RE.captures(t).and_then(|c| c[1].parse::<f64>().ok()).filter(|s| valid_basic_score(*s))
            })
            .or_else(|| label_parent_text(section, SCORE_LABEL).and_then(|t| measure_in(&t).score)),
        }
    }
}

impl LocatorStrategy for SectionPattern {
    fn name(&self) -> &'static str {
        "section"
    }

    fn locate(&self, doc: &Document) -> BasicMeasure {
        safety_section(doc)
            .map(|section| measure_in(&visible_text(section)))
            .unwrap_or_default()
    }
}

impl LocatorStrategy for DocumentPattern {
    fn name(&self) -> &'static str {
        "document"
    }

    fn locate(&self, doc: &Document) -> BasicMeasure {
        measure_in(&visible_text(doc.body()))
    }
}

// ── Page helpers ──

fn carries_both_labels(text: &str) -> bool {
    text.contains(PERCENTILE_LABEL) && text.contains(SCORE_LABEL)
}

/// Container of the active panel: the nearest ancestor of the active heading
/// holding both labels, else the tightest visible block holding both.
fn safety_section(doc: &Document) -> Option<ElementRef<'_>> {
    let heading = active_heading(doc);
    let from_heading = heading.as_deref().and_then(|wanted| {
        let el = doc
            .html()
            .select(&HEADING_SEL)
            .find(|h| is_visible(*h) && element_text(*h) == wanted)?;
        el.ancestors()
            .filter_map(ElementRef::wrap)
            .take(MAX_SECTION_DEPTH)
            .find(|a| carries_both_labels(&visible_text(*a)))
    });
    from_heading.or_else(|| {
        doc.html()
            .select(&DIV_SEL)
            .filter(|d| is_visible(*d))
            .map(|d| (d, visible_text(d)))
            .filter(|(_, t)| carries_both_labels(t) && !t.contains(SECTION_EXCLUDE))
            .min_by_key(|(_, t)| t.len())
            .map(|(d, _)| d)
    })
}

/// Deepest visible element under `section` whose text contains `label`.
fn label_element<'a>(section: ElementRef<'a>, label: &str) -> Option<ElementRef<'a>> {
    section
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| is_visible(*el) && element_text(*el).contains(label))
        .find(|el| {
            !el.children()
                .filter_map(ElementRef::wrap)
                .any(|c| element_text(c).contains(label))
        })
}

/// Value from a highlight-styled `<div>` beside the label.
fn highlighted(section: ElementRef, label: &str, parse: impl Fn(&str) -> Option<f64>) -> Option<f64> {
    let parent = label_element(section, label)?.parent().and_then(ElementRef::wrap)?;
    parent
        .select(&DIV_SEL)
        .filter(|d| is_visible(*d) && is_highlight(*d))
        .find_map(|d| parse(&element_text(d)))
}

fn label_parent_text(section: ElementRef, label: &str) -> Option<String> {
    let parent = label_element(section, label)?.parent().and_then(ElementRef::wrap)?;
    Some(visible_text(parent))
}

fn is_highlight(el: ElementRef) -> bool {
    let value = el.value();
    if value.classes().any(|c| HIGHLIGHT_CLASSES.contains(&c)) {
        return true;
    }
    value.attr("style").is_some_and(|style| {
        style.split(';').filter_map(|decl| decl.split_once(':')).any(|(prop, val)| {
            let val: String = val.chars().filter(|c| !c.is_whitespace()).collect();
            prop.trim().eq_ignore_ascii_case("color") && HIGHLIGHT_COLORS.contains(&val.as_str())
        })
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Document {
        Document::parse(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn highlighted_values_win() {
        let doc = page(
            r#"<div><h3>Unsafe Driving</h3>
               <div><div>CSA Percentile Equivalent</div><div class="text-yellow-500">45%</div></div>
               <div><div>BASIC Score</div><div style="color: rgb(234, 179, 8)">3.2</div></div>
               <p>CSA Percentile Equivalent: 99% BASIC Score: 9.9</p></div>"#,
        );
        let m = locate(&default_cascade(), &doc);
        assert_eq!(m, BasicMeasure { percentile: Some(45.0), score: Some(3.2) });
    }

    #[test]
    fn plain_markup_falls_back_to_section_text() {
        let doc = page(
            r#"<div><h3>Vehicle Maintenance</h3><p>CSA Percentile Equivalent: 61%</p><p>BASIC Score: 4.5</p></div>
               <div>CSA Percentile Equivalent: 5% BASIC Score: 1.0</div>"#,
        );
        let m = locate(&default_cascade(), &doc);
        assert_eq!(m, BasicMeasure { percentile: Some(61.0), score: Some(4.5) });
    }

    #[test]
    fn out_of_range_highlight_is_rejected() {
        let doc = page(
            r#"<div><h3>Driver Fitness</h3>
               <div><div>CSA Percentile Equivalent</div><div class="text-lg">20%</div></div>
               <div><div>BASIC Score</div><div class="text-lg">12</div></div></div>"#,
        );
        let m = locate(&default_cascade(), &doc);
        assert_eq!(m.percentile, Some(20.0));
        assert_eq!(m.score, None);
    }

    #[test]
    fn eld_card_is_not_a_section() {
        let doc = page(r#"<div>ELD Connection CSA Percentile 80% BASIC Score 7</div>"#);
        assert_eq!(HighlightLabel.locate(&doc), BasicMeasure::default());
        assert_eq!(SectionPattern.locate(&doc), BasicMeasure::default());
        // only the whole-document pass still reads it
        let m = locate(&default_cascade(), &doc);
        assert_eq!(m, BasicMeasure { percentile: Some(80.0), score: Some(7.0) });
    }
}
