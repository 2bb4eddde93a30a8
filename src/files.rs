use scraper::{Html, Selector};
use url::Url;

use crate::domain::RecordId;
use crate::error::GrabError;

/// One downloadable file of a record: its remote filename (the anchor
/// text) and the absolute URL it is fetched from.
#[derive(Debug, Clone)]
pub struct RecordFile {
    pub name: String,
    pub url: Url,
}

/// Collects the files belonging to `id` from its per-record page. An
/// anchor is selected iff its visible text starts with the record id;
/// everything else on the page (parent-directory links, column sorters,
/// navigation) is ignored. Zero matches is an empty set, not an error.
pub fn enumerate_files(
    doc: &Html,
    page_url: &Url,
    id: &RecordId,
) -> Result<Vec<RecordFile>, GrabError> {
    let anchor_sel = Selector::parse("a").unwrap();
    let base = dir_url(page_url);

    let mut files = Vec::new();
    for anchor in doc.select(&anchor_sel) {
        let text = anchor.text().collect::<String>();
        let name = text.trim();
        if !name.starts_with(id.as_str()) {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let url = base
            .join(href)
            .map_err(|err| GrabError::InvalidUrl(format!("file {name} href {href:?}: {err}")))?;
        files.push(RecordFile {
            name: name.to_string(),
            url,
        });
    }
    Ok(files)
}

/// Treats a per-record page URL as a directory so relative hrefs resolve
/// under it rather than replacing its last path segment.
fn dir_url(url: &Url) -> Url {
    if url.path().ends_with('/') {
        return url.clone();
    }
    let mut base = url.clone();
    base.set_path(&format!("{}/", url.path()));
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD_PAGE: &str = r#"
        <html><body>
        <h1>Index of a40439n</h1>
        <a href="../">Parent directory</a>
        <a href="a40439n.hea">a40439n.hea</a>
        <a href="a40439n.dat">a40439n.dat</a>
        <a href="ANNOTATIONS.txt">ANNOTATIONS.txt</a>
        </body></html>
    "#;

    fn id() -> RecordId {
        "a40439n".parse().unwrap()
    }

    #[test]
    fn selects_prefix_matching_anchors_only() {
        let doc = Html::parse_document(RECORD_PAGE);
        let page = Url::parse("https://example.org/records/a40439n/").unwrap();
        let files = enumerate_files(&doc, &page, &id()).unwrap();

        let names = files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a40439n.hea", "a40439n.dat"]);
        assert_eq!(
            files[0].url.as_str(),
            "https://example.org/records/a40439n/a40439n.hea"
        );
    }

    #[test]
    fn prefix_match_is_case_sensitive() {
        let doc = Html::parse_document(r#"<a href="A40439N.hea">A40439N.hea</a>"#);
        let page = Url::parse("https://example.org/records/a40439n/").unwrap();
        let files = enumerate_files(&doc, &page, &id()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn page_url_without_trailing_slash_resolves_under_record() {
        let doc = Html::parse_document(r#"<a href="a40439n.hea">a40439n.hea</a>"#);
        let page = Url::parse("https://example.org/records/a40439n").unwrap();
        let files = enumerate_files(&doc, &page, &id()).unwrap();
        assert_eq!(
            files[0].url.as_str(),
            "https://example.org/records/a40439n/a40439n.hea"
        );
    }

    #[test]
    fn no_matching_links_yields_empty_set() {
        let doc = Html::parse_document(r#"<a href="../">Parent directory</a>"#);
        let page = Url::parse("https://example.org/records/a40439n/").unwrap();
        let files = enumerate_files(&doc, &page, &id()).unwrap();
        assert!(files.is_empty());
    }
}
