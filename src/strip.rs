use crate::error::Result;
use crate::locate::{ContentTree, parse_selector};
use crate::profile::NoiseRules;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripReport {
    pub scripts: usize,
    pub ads: usize,
    pub rear_comments: usize,
    pub inserts: usize,
    pub leading_paragraph: bool,
}

impl StripReport {
    pub fn removed_anything(&self) -> bool {
        self.scripts + self.ads + self.rear_comments + self.inserts > 0 || self.leading_paragraph
    }
}

/// Removes noise from `tree` in place. Running it again on the same tree
/// removes nothing further.
pub fn strip(tree: &mut ContentTree, rules: &NoiseRules) -> Result<StripReport> {
    let mut report = StripReport {
        scripts: tree.detach_matching(&parse_selector("script")?),
        ..StripReport::default()
    };

    if !rules.ad_selectors.is_empty() {
        let ads = parse_selector(&rules.ad_selectors.join(", "))?;
        report.ads = tree.detach_matching(&ads);
    }

    if rules.strip_after_rule {
        report.rear_comments = tree.detach_matching(&parse_selector("hr ~ *")?);
    }

    report.inserts = tree.detach_matching(&parse_selector("ins")?);

    if rules.drop_leading_paragraph && !tree.leading_paragraph_dropped() {
        report.leading_paragraph = tree.detach_leading(&parse_selector("p")?);
    }

    tracing::debug!(
        scripts = report.scripts,
        ads = report.ads,
        rear_comments = report.rear_comments,
        inserts = report.inserts,
        leading_paragraph = report.leading_paragraph,
        "stripped noise"
    );
    if tree.is_empty() {
        tracing::debug!("content is empty after stripping");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Site, SiteProfile};

    const DIVINE_CONTENT: &str = r#"<div class="entry-content">
<p>Chapter 12 – The Blade</p>
<script>track()</script>
<p>It was raining.</p>
<div class="ezoic-ad"><span>buy now</span></div>
<p>She drew the blade.<ins class="adsbygoogle"></ins></p>
<div class="banner-1"></div>
<hr>
<p>Comments (3)</p>
<div class="sharedaddy">share</div>
</div>"#;

    #[test]
    fn applies_every_rule_of_the_profile() -> anyhow::Result<()> {
        let rules = SiteProfile::for_site(Site::DivineDaoLibrary).noise;
        let mut tree = ContentTree::from_fragment(DIVINE_CONTENT);

        let report = strip(&mut tree, &rules)?;

        assert_eq!(report.scripts, 1);
        assert_eq!(report.ads, 2);
        assert_eq!(report.rear_comments, 2);
        assert_eq!(report.inserts, 1);
        assert!(report.leading_paragraph);

        let html = tree.to_html();
        assert!(!html.contains("script"));
        assert!(!html.contains("buy now"));
        assert!(!html.contains("Comments"));
        assert!(!html.contains("sharedaddy"));
        assert!(!html.contains("<ins"));
        assert!(!html.contains("The Blade</p>"));
        assert!(html.contains("It was raining."));
        assert!(html.contains("She drew the blade."));
        assert!(html.contains("<hr>"));
        Ok(())
    }

    #[test]
    fn stripping_twice_changes_nothing() -> anyhow::Result<()> {
        for site in [Site::DivineDaoLibrary, Site::NovelFull, Site::MoboReader] {
            let rules = SiteProfile::for_site(site).noise;
            let mut tree = ContentTree::from_fragment(DIVINE_CONTENT);

            strip(&mut tree, &rules)?;
            let once = tree.to_html();
            let second = strip(&mut tree, &rules)?;

            assert_eq!(tree.to_html(), once, "{site:?}");
            assert!(!second.removed_anything(), "{site:?}");
        }
        Ok(())
    }

    #[test]
    fn missing_noise_is_not_an_error() -> anyhow::Result<()> {
        let rules = SiteProfile::for_site(Site::DivineDaoLibrary).noise;
        let mut tree = ContentTree::from_fragment("<div><hr></div>");

        let report = strip(&mut tree, &rules)?;

        assert!(!report.removed_anything());
        assert_eq!(tree.to_html(), "<div><hr></div>");
        Ok(())
    }

    #[test]
    fn content_may_end_up_empty() -> anyhow::Result<()> {
        let rules = SiteProfile::for_site(Site::DivineDaoLibrary).noise;
        let mut tree = ContentTree::from_fragment("<div><p>only boilerplate</p></div>");

        strip(&mut tree, &rules)?;

        assert!(tree.is_empty());
        assert_eq!(
            tree.to_html(),
            "<div><!--leading-paragraph-dropped--></div>"
        );
        Ok(())
    }

    #[test]
    fn leading_paragraph_drop_survives_reserialisation() -> anyhow::Result<()> {
        let rules = SiteProfile::for_site(Site::DivineDaoLibrary).noise;
        let mut tree = ContentTree::from_fragment("<div><p>Boilerplate</p><p>Story</p></div>");
        strip(&mut tree, &rules)?;

        let mut reparsed = ContentTree::from_fragment(&tree.to_html());
        let report = strip(&mut reparsed, &rules)?;

        assert!(!report.leading_paragraph);
        assert!(reparsed.to_html().contains("<p>Story</p>"));
        assert!(!reparsed.is_empty());
        Ok(())
    }

    #[test]
    fn novelfull_keeps_leading_paragraph_and_rear_content() -> anyhow::Result<()> {
        let rules = SiteProfile::for_site(Site::NovelFull).noise;
        let mut tree = ContentTree::from_fragment(concat!(
            r#"<div id="chapter-content"><p>One</p>"#,
            r#"<div class="ads-holder">x</div><hr><p>Two</p></div>"#,
        ));

        strip(&mut tree, &rules)?;

        assert_eq!(
            tree.to_html(),
            r#"<div id="chapter-content"><p>One</p><hr><p>Two</p></div>"#
        );
        Ok(())
    }
}
