use std::time::Duration;

use camino::Utf8Path;
use scraper::Html;
use serde::Serialize;

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::{GroupFilter, ResolvedConfig};
use crate::domain::RecordId;
use crate::error::GrabError;
use crate::files;
use crate::listing::{self, GroupSection};
use crate::plot;
use crate::site::SiteClient;
use crate::store::Store;
use crate::wfdb::WfdbRecord;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub started_at: String,
    pub items: Vec<SyncItemResult>,
    pub catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncItemResult {
    pub record: String,
    pub group: String,
    pub action: String,
    pub files: Vec<String>,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelsResult {
    pub record: String,
    pub sampling_frequency: f64,
    pub samples: usize,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlotResult {
    pub record: String,
    pub channel: String,
    pub samples: usize,
    pub duration_secs: f64,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<S: SiteClient> {
    store: Store,
    site: S,
}

impl<S: SiteClient> App<S> {
    pub fn new(store: Store, site: S) -> Self {
        Self { store, site }
    }

    /// Runs the whole discovery-and-download pipeline for the configured
    /// root page. The catalog is owned here and returned with the
    /// result; a failure anywhere aborts the batch at that point.
    pub fn sync(
        &self,
        config: &ResolvedConfig,
        options: SyncOptions,
        sink: &dyn ProgressSink,
    ) -> Result<SyncResult, GrabError> {
        let started_at = iso_timestamp();

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; retrieving listing {}", config.root_url),
            elapsed: None,
        });
        let body = self.site.fetch_page(&config.root_url)?;
        let doc = Html::parse_document(&body);

        sink.event(ProgressEvent {
            message: "phase=Parse; scanning group sections".to_string(),
            elapsed: None,
        });
        let groups = listing::parse_groups(&doc)?;
        let selected = select_groups(&groups, &config.groups);

        if !options.dry_run {
            self.store.ensure_samples_root()?;
        }

        let mut catalog = Catalog::new();
        let mut items = Vec::new();
        for section in selected {
            sink.event(ProgressEvent {
                message: format!("phase=Resolve; group {}", section.code),
                elapsed: None,
            });
            let records =
                listing::resolve_records(section, &config.root_url, &config.record_column)?;

            for link in records {
                sink.event(ProgressEvent {
                    message: format!("phase=Enumerate; record {}", link.id),
                    elapsed: None,
                });
                let page = self.site.fetch_page(&link.url)?;
                let record_doc = Html::parse_document(&page);
                let record_files = files::enumerate_files(&record_doc, &link.url, &link.id)?;

                let mut names = Vec::new();
                let mut paths = Vec::new();
                for file in &record_files {
                    let destination = self.store.file_path(&file.name);
                    if !options.dry_run {
                        let start = std::time::Instant::now();
                        self.site.download_file(&file.url, destination.as_std_path())?;
                        sink.event(ProgressEvent {
                            message: format!(
                                "site.response file={} latency_ms={}",
                                file.name,
                                start.elapsed().as_millis()
                            ),
                            elapsed: None,
                        });
                    }
                    names.push(file.name.clone());
                    paths.push(destination.to_string());
                }

                catalog.insert(link.id.clone(), section.code.clone());
                items.push(SyncItemResult {
                    record: link.id.to_string(),
                    group: section.code.to_string(),
                    action: if options.dry_run {
                        "dry-run".to_string()
                    } else {
                        "download".to_string()
                    },
                    files: names,
                    paths,
                });
            }
        }

        Ok(SyncResult {
            started_at,
            items,
            catalog: catalog.entries().to_vec(),
        })
    }

    /// Lists the channel names of an already-downloaded record.
    pub fn channels(
        &self,
        id: &RecordId,
        sink: &dyn ProgressSink,
    ) -> Result<ChannelsResult, GrabError> {
        sink.event(ProgressEvent {
            message: format!("phase=Read; record {id}"),
            elapsed: None,
        });
        let record = self.read_record(id)?;
        Ok(ChannelsResult {
            record: id.to_string(),
            sampling_frequency: record.sampling_frequency(),
            samples: record.sample_count(),
            channels: record
                .channel_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    /// Reads an already-downloaded record and plots one channel against
    /// its time axis.
    pub fn plot(
        &self,
        id: &RecordId,
        channel: &str,
        output: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<PlotResult, GrabError> {
        sink.event(ProgressEvent {
            message: format!("phase=Read; record {id}"),
            elapsed: None,
        });
        let record = self.read_record(id)?;
        let index = record.channel_index(channel)?;

        sink.event(ProgressEvent {
            message: format!("phase=Plot; channel {channel} -> {output}"),
            elapsed: None,
        });
        plot::render_channel(&record, index, output)?;

        Ok(PlotResult {
            record: id.to_string(),
            channel: channel.to_string(),
            samples: record.sample_count(),
            duration_secs: record.sample_count() as f64 / record.sampling_frequency(),
            output: output.to_string(),
        })
    }

    fn read_record(&self, id: &RecordId) -> Result<WfdbRecord, GrabError> {
        if !self.store.record_exists(id) {
            return Err(GrabError::RecordNotFound(id.to_string()));
        }
        WfdbRecord::read(self.store.samples_root(), id)
    }
}

fn select_groups<'g, 'd>(
    groups: &'g [GroupSection<'d>],
    filter: &GroupFilter,
) -> Vec<&'g GroupSection<'d>> {
    match filter {
        GroupFilter::Max(count) => groups.iter().take(*count).collect(),
        GroupFilter::Include(codes) => groups
            .iter()
            .filter(|section| codes.contains(&section.code))
            .collect(),
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
