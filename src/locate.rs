use scraper::node::{Comment, Node};
use scraper::{ElementRef, Html, Selector};

use crate::error::{ReaderError, Result};

/// The chapter body, detached from the page it was found in.
///
/// Nodes live in the arena of a private fragment document and are removed by
/// handle, so a cleaned tree never keeps a reference to the source page.
#[derive(Debug, Clone)]
pub struct ContentTree {
    html: Html,
}

/// Comment left as the first child of the content root once its leading
/// paragraph is gone. It survives serialisation.
const LEADING_DROPPED: &str = "leading-paragraph-dropped";

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|err| ReaderError::InvalidSelector {
        selector: selector.to_owned(),
        reason: err.to_string(),
    })
}

/// First element of `document` matching `selector`.
pub fn locate(document: &str, selector: &str) -> Result<ContentTree> {
    let compiled = parse_selector(selector)?;
    let html = Html::parse_document(document);
    let content = html
        .select(&compiled)
        .next()
        .ok_or_else(|| ReaderError::Locate {
            selector: selector.to_owned(),
        })?;
    Ok(ContentTree::from_fragment(&content.html()))
}

impl ContentTree {
    pub fn from_fragment(markup: &str) -> Self {
        Self {
            html: Html::parse_fragment(markup),
        }
    }

    pub fn root(&self) -> Option<ElementRef<'_>> {
        self.html
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
    }

    pub fn to_html(&self) -> String {
        self.root().map(|root| root.html()).unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.root()
            .map(|root| root.text().collect::<String>())
            .unwrap_or_default()
    }

    /// True when the root holds nothing but comments.
    pub fn is_empty(&self) -> bool {
        self.root()
            .is_none_or(|root| root.children().all(|child| child.value().is_comment()))
    }

    pub(crate) fn leading_paragraph_dropped(&self) -> bool {
        self.root().is_some_and(|root| {
            root.children()
                .filter_map(|child| child.value().as_comment())
                .any(|comment| &*comment.comment == LEADING_DROPPED)
        })
    }

    /// Detaches every descendant of the content root matching `selector`.
    pub(crate) fn detach_matching(&mut self, selector: &Selector) -> usize {
        let ids: Vec<_> = match self.root() {
            Some(root) => root.select(selector).map(|el| el.id()).collect(),
            None => return 0,
        };
        for id in &ids {
            if let Some(mut node) = self.html.tree.get_mut(*id) {
                node.detach();
            }
        }
        ids.len()
    }

    /// Detaches the first descendant matching `selector`, at most once per tree.
    pub(crate) fn detach_leading(&mut self, selector: &Selector) -> bool {
        if self.leading_paragraph_dropped() {
            return false;
        }
        let Some(root) = self.root() else {
            return false;
        };
        let root_id = root.id();
        let Some(first) = root.select(selector).next().map(|el| el.id()) else {
            return false;
        };
        if let Some(mut node) = self.html.tree.get_mut(first) {
            node.detach();
        }
        if let Some(mut root) = self.html.tree.get_mut(root_id) {
            root.prepend(Node::Comment(Comment {
                comment: LEADING_DROPPED.into(),
            }));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
  <head><title>Chapter 3</title></head>
  <body>
    <main>
      <article>
        <div class="entry-content"><p>First</p><p>Second</p></div>
      </article>
      <article>
        <div class="entry-content"><p>Other</p></div>
      </article>
    </main>
  </body>
</html>"#;

    #[test]
    fn locate_takes_first_match() -> anyhow::Result<()> {
        let tree = locate(PAGE, "main > article .entry-content")?;
        assert_eq!(
            tree.to_html(),
            r#"<div class="entry-content"><p>First</p><p>Second</p></div>"#
        );
        assert_eq!(tree.text(), "FirstSecond");
        Ok(())
    }

    #[test]
    fn missing_content_is_a_locate_error() {
        let err = locate(PAGE, "#chapter-content").unwrap_err();
        assert!(matches!(err, ReaderError::Locate { .. }));
    }

    #[test]
    fn invalid_selector_is_reported() {
        let err = locate(PAGE, "[[nope").unwrap_err();
        assert!(matches!(err, ReaderError::InvalidSelector { .. }));
    }

    #[test]
    fn detach_matching_removes_subtrees() -> anyhow::Result<()> {
        let mut tree =
            ContentTree::from_fragment("<div><p>a</p><span><b>x</b></span><p>b</p></div>");
        let removed = tree.detach_matching(&parse_selector("span")?);
        assert_eq!(removed, 1);
        assert_eq!(tree.to_html(), "<div><p>a</p><p>b</p></div>");
        assert!(!tree.is_empty());
        Ok(())
    }

    #[test]
    fn leading_drop_is_recorded_in_the_markup() -> anyhow::Result<()> {
        let mut tree = ContentTree::from_fragment("<div><p>a</p><p>b</p></div>");

        assert!(tree.detach_leading(&parse_selector("p")?));
        assert_eq!(
            tree.to_html(),
            "<div><!--leading-paragraph-dropped--><p>b</p></div>"
        );

        let mut reparsed = ContentTree::from_fragment(&tree.to_html());
        assert!(reparsed.leading_paragraph_dropped());
        assert!(!reparsed.detach_leading(&parse_selector("p")?));
        assert_eq!(reparsed.to_html(), tree.to_html());
        Ok(())
    }
}
