use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::locate::ContentTree;

pub const STYLESHEET: &str = "
      body {
        margin-left: 5rem;
        margin-right: 5rem;
      }
      .p_sj {
        font-family: Microsoft YaHei;
        color: #333;
        font-size: 1.2rem;
      }
      .name {
        text-align: center;
        font-family: Microsoft YaHei;
        font-weight: 700;
        color: #333;
        margin: 1rem;
      }
      .end {
        margin-top: 2rem;
      }
    ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub class: Option<&'static str>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ChapterShell<'a> {
    pub title: &'a str,
    pub headings: Vec<Heading>,
    pub source_url: &'a str,
}

/// `Chapter_00012_the-blade` -> `00012 THE BLADE`.
pub fn heading_from_file_name(file_name: &str) -> String {
    file_name
        .replace("Chapter_", "")
        .replace(['-', '_'], " ")
        .to_uppercase()
}

pub fn assemble(content: &ContentTree, shell: &ChapterShell<'_>) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n  <head>\n");
    out.push_str("    <meta charset=\"utf-8\">\n");
    out.push_str(&format!("    <title>{}</title>\n", encode_text(shell.title)));
    out.push_str(&format!("    <style>{STYLESHEET}</style>\n"));
    out.push_str("  </head>\n  <body>\n");

    for heading in &shell.headings {
        let level = heading.level.clamp(1, 6);
        let class = heading
            .class
            .map(|class| format!(" class=\"{}\"", encode_double_quoted_attribute(class)))
            .unwrap_or_default();
        out.push_str(&format!(
            "    <h{level}{class}>{}</h{level}>\n",
            encode_text(&heading.text)
        ));
    }

    out.push_str("    ");
    out.push_str(&content.to_html());
    out.push('\n');

    out.push_str("    <div class=\"end\">\n      <p>The End...</p>\n");
    if !shell.source_url.is_empty() {
        out.push_str(&format!(
            "      <a href=\"{}\">{}</a>\n",
            encode_double_quoted_attribute(shell.source_url),
            encode_text(shell.source_url)
        ));
    }
    out.push_str("    </div>\n  </body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(headings: Vec<Heading>) -> ChapterShell<'static> {
        ChapterShell {
            title: "Chapter_00012_Rain & <Ash>",
            headings,
            source_url: "https://example.com/c/12?a=1&b=\"2\"",
        }
    }

    #[test]
    fn heading_from_file_name_spaces_and_uppercases() {
        assert_eq!(
            heading_from_file_name("Chapter_00012_the-blade_edge"),
            "00012 THE BLADE EDGE"
        );
    }

    #[test]
    fn shell_wraps_content_with_footer() {
        let content = ContentTree::from_fragment("<div><p>Body</p></div>");
        let doc = assemble(
            &content,
            &shell(vec![Heading {
                level: 3,
                class: None,
                text: "00012 RAIN".to_owned(),
            }]),
        );

        assert!(doc.starts_with("<!DOCTYPE html>\n<html>\n"));
        assert!(doc.contains("<title>Chapter_00012_Rain &amp; &lt;Ash&gt;</title>"));
        assert!(doc.contains("<h3>00012 RAIN</h3>"));
        assert!(doc.contains("    <div><p>Body</p></div>\n"));
        assert!(doc.contains("<p>The End...</p>"));
        assert!(doc.contains(r#"<a href="https://example.com/c/12?a=1&amp;b=&quot;2&quot;">"#));
        assert!(doc.contains(".end {"));
    }

    #[test]
    fn identical_input_gives_identical_bytes() {
        let content = ContentTree::from_fragment("<div><p>Body</p></div>");
        let headings = vec![
            Heading {
                level: 3,
                class: Some("name"),
                text: "Apotheosis".to_owned(),
            },
            Heading {
                level: 4,
                class: Some("name"),
                text: "Chapter 1".to_owned(),
            },
        ];
        let a = assemble(&content, &shell(headings.clone()));
        let b = assemble(&content, &shell(headings));
        assert_eq!(a, b);
        assert!(a.contains(r#"<h3 class="name">Apotheosis</h3>"#));
        assert!(a.contains(r#"<h4 class="name">Chapter 1</h4>"#));
    }

    #[test]
    fn footer_link_is_omitted_without_source() {
        let content = ContentTree::from_fragment("<div></div>");
        let doc = assemble(
            &content,
            &ChapterShell {
                title: "t",
                headings: Vec::new(),
                source_url: "",
            },
        );
        assert!(!doc.contains("<a "));
        assert!(doc.contains("<p>The End...</p>"));
    }
}
