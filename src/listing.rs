use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::{GroupCode, RecordId};
use crate::error::GrabError;

const GROUP_MARKER: &str = "Group ";

/// One group section of the listing page: the heading that names the
/// group and anchors the lookup of the record table that follows it.
#[derive(Debug)]
pub struct GroupSection<'a> {
    pub code: GroupCode,
    heading: ElementRef<'a>,
}

/// A record discovered in a group's table: its identifier and the
/// absolute URL of its per-record file listing page.
#[derive(Debug, Clone)]
pub struct RecordLink {
    pub id: RecordId,
    pub url: Url,
}

/// Extracts the ordered group sections from the root listing page.
/// A heading participates iff its text contains the `"Group "` marker;
/// the group code is the two characters immediately following it.
pub fn parse_groups(doc: &Html) -> Result<Vec<GroupSection<'_>>, GrabError> {
    let heading_sel = Selector::parse("h1, h2, h3, h4").unwrap();

    let mut sections = Vec::new();
    for heading in doc.select(&heading_sel) {
        let text = heading.text().collect::<String>();
        let Some(marker) = text.find(GROUP_MARKER) else {
            continue;
        };
        let code_start = marker + GROUP_MARKER.len();
        let code = text[code_start..].chars().take(2).collect::<String>();
        if code.chars().count() < 2 {
            return Err(GrabError::MalformedPage(format!(
                "heading {:?} lacks a group code after {GROUP_MARKER:?}",
                text.trim()
            )));
        }
        sections.push(GroupSection {
            code: code.parse()?,
            heading,
        });
    }
    Ok(sections)
}

/// Resolves the records of one group section. The next `table` element
/// following the heading holds one record per data row; the record
/// column is located by matching `record_column` against the header-row
/// labels rather than by a fixed position, so a reshuffled table fails
/// loudly instead of mis-binding.
pub fn resolve_records(
    section: &GroupSection<'_>,
    base: &Url,
    record_column: &str,
) -> Result<Vec<RecordLink>, GrabError> {
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("th, td").unwrap();
    let anchor_sel = Selector::parse("a").unwrap();

    let table = section
        .heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
        .ok_or_else(|| {
            GrabError::MalformedPage(format!("no table follows group {} heading", section.code))
        })?;

    let mut rows = table.select(&row_sel);
    let header = rows.next().ok_or_else(|| {
        GrabError::MalformedPage(format!("group {} table has no rows", section.code))
    })?;

    let wanted = record_column.to_lowercase();
    let column = header
        .select(&cell_sel)
        .position(|cell| {
            cell.text()
                .collect::<String>()
                .to_lowercase()
                .contains(&wanted)
        })
        .ok_or_else(|| {
            GrabError::MalformedPage(format!(
                "group {} table has no {record_column:?} column",
                section.code
            ))
        })?;

    let mut records = Vec::new();
    for row in rows {
        let cells = row.select(&cell_sel).collect::<Vec<_>>();
        // Separator and spacer rows carry at most one cell.
        if cells.len() <= 1 {
            continue;
        }
        let cell = cells.get(column).ok_or_else(|| {
            GrabError::MalformedPage(format!(
                "group {} row has {} cells, record column is {}",
                section.code,
                cells.len(),
                column + 1
            ))
        })?;
        let anchor = cell.select(&anchor_sel).next().ok_or_else(|| {
            GrabError::MalformedPage(format!(
                "group {} record cell holds no link",
                section.code
            ))
        })?;
        let id: RecordId = anchor.text().collect::<String>().parse()?;
        let href = anchor.value().attr("href").ok_or_else(|| {
            GrabError::MalformedPage(format!("record {id} link has no href"))
        })?;
        let url = base
            .join(href)
            .map_err(|err| GrabError::InvalidUrl(format!("record {id} href {href:?}: {err}")))?;
        records.push(RecordLink { id, url });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <h1>Training set</h1>
        <h2>Group H1, records with documented events</h2>
        <table>
          <tr><th>Clinical record</th><th>Waveform record</th><th>Numerics record</th></tr>
          <tr><td>a40439</td><td><a href="/records/a40439/">a40439</a></td>
              <td><a href="/records/a40439n/">a40439n</a></td></tr>
          <tr><td colspan="3">&nbsp;</td></tr>
          <tr><td>a40017</td><td><a href="/records/a40017/">a40017</a></td>
              <td><a href="/records/a40017n/">a40017n</a></td></tr>
        </table>
        <h2>Group C2, control records</h2>
        <table>
          <tr><th>Clinical record</th><th>Waveform record</th><th>Numerics record</th></tr>
          <tr><td>a41200</td><td><a href="/records/a41200/">a41200</a></td>
              <td><a href="/records/a41200n/">a41200n</a></td></tr>
        </table>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://example.org/challenge/training-set.shtml").unwrap()
    }

    #[test]
    fn parse_groups_in_listing_order() {
        let doc = Html::parse_document(LISTING);
        let groups = parse_groups(&doc).unwrap();
        let codes = groups.iter().map(|g| g.code.as_str()).collect::<Vec<_>>();
        assert_eq!(codes, vec!["H1", "C2"]);
    }

    #[test]
    fn heading_without_marker_is_not_a_group() {
        let doc = Html::parse_document("<h1>Training set</h1><h2>Appendix</h2>");
        let groups = parse_groups(&doc).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn truncated_group_code_fails() {
        let doc = Html::parse_document("<h2>Group H</h2>");
        let err = parse_groups(&doc).unwrap_err();
        assert_matches!(err, GrabError::MalformedPage(_));
    }

    #[test]
    fn invalid_group_code_fails() {
        let doc = Html::parse_document("<h2>Group ??, odd heading</h2>");
        let err = parse_groups(&doc).unwrap_err();
        assert_matches!(err, GrabError::InvalidGroupCode(_));
    }

    #[test]
    fn resolve_records_skips_separator_rows() {
        let doc = Html::parse_document(LISTING);
        let groups = parse_groups(&doc).unwrap();
        let records = resolve_records(&groups[0], &base(), "Numerics record").unwrap();

        let ids = records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a40439n", "a40017n"]);
        assert_eq!(
            records[0].url.as_str(),
            "https://example.org/records/a40439n/"
        );
    }

    #[test]
    fn resolve_records_per_group() {
        let doc = Html::parse_document(LISTING);
        let groups = parse_groups(&doc).unwrap();
        let records = resolve_records(&groups[1], &base(), "Numerics record").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_str(), "a41200n");
    }

    #[test]
    fn missing_record_column_fails_before_rows() {
        let doc = Html::parse_document(
            r#"<h2>Group H1, test</h2>
               <table>
                 <tr><th>Clinical record</th><th>Waveform record</th></tr>
                 <tr><td>x</td><td><a href="/records/a1/">a1</a></td></tr>
               </table>"#,
        );
        let groups = parse_groups(&doc).unwrap();
        let err = resolve_records(&groups[0], &base(), "Numerics record").unwrap_err();
        assert_matches!(err, GrabError::MalformedPage(_));
    }

    #[test]
    fn missing_table_fails() {
        let doc = Html::parse_document("<h2>Group H1, no table here</h2><p>prose</p>");
        let groups = parse_groups(&doc).unwrap();
        let err = resolve_records(&groups[0], &base(), "Numerics record").unwrap_err();
        assert_matches!(err, GrabError::MalformedPage(_));
    }

    #[test]
    fn non_token_record_cell_fails_loudly() {
        let doc = Html::parse_document(
            r#"<h2>Group H1, test</h2>
               <table>
                 <tr><th>Numerics record</th><th>Notes</th></tr>
                 <tr><td><a href="/records/x/">see record</a></td><td>n/a</td></tr>
               </table>"#,
        );
        let groups = parse_groups(&doc).unwrap();
        let err = resolve_records(&groups[0], &base(), "Numerics record").unwrap_err();
        assert_matches!(err, GrabError::InvalidRecordId(_));
    }
}
