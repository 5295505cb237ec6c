//! Pastebin 站点
//!
//! 正文是纯文本粘贴，通过 `/raw/<id>` 获取；目录本身也是一个粘贴，
//! 每行形如 `Capítulo N: https://pastebin.com/<id>`。

use regex::Regex;
use tracing::warn;
use url::Url;

use crate::core::error::ExtractionError;
use crate::core::model::ChapterCandidate;
use crate::core::source::SourceConfig;
use crate::interfaces::Scraper;
use crate::sites::extractor::{Extractor, RawChapter};

pub struct PastebinScraper {
    source: SourceConfig,
    extractor: Extractor,
    links: Vec<Regex>,
}

impl PastebinScraper {
    pub fn new(source: SourceConfig, min_chapter_warning: usize) -> Self {
        let links = source
            .patterns("next_chapter")
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("[{}] next_chapter 正则无法解析 {:?}: {}", source.name, p, e);
                    None
                }
            })
            .collect();

        Self {
            extractor: Extractor::new(&source, min_chapter_warning),
            links,
            source,
        }
    }

    /// `https://pastebin.com/abc` -> `https://pastebin.com/raw/abc`
    fn raw_url(paste_url: &str) -> String {
        let Ok(mut url) = Url::parse(paste_url) else {
            return paste_url.to_string();
        };
        let id = match url.path_segments().map(|s| s.filter(|p| !p.is_empty()).collect::<Vec<_>>()) {
            Some(segments) if segments.len() == 1 => segments[0].to_string(),
            _ => return paste_url.to_string(),
        };
        url.set_path(&format!("/raw/{id}"));
        url.set_fragment(None);
        url.to_string()
    }
}

impl Scraper for PastebinScraper {
    fn source(&self) -> &SourceConfig {
        &self.source
    }

    fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    fn index_url(&self, source_url: &str) -> String {
        Self::raw_url(source_url)
    }

    fn content_url(&self, chapter_url: &str) -> String {
        Self::raw_url(chapter_url)
    }

    fn extract_chapters(
        &self,
        html: &str,
        _page_url: &str,
    ) -> Result<Vec<ChapterCandidate>, ExtractionError> {
        if self.links.is_empty() {
            return Err(ExtractionError::MissingSelector("next_chapter"));
        }
        if html.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }

        let raw: Vec<RawChapter> = html
            .lines()
            .filter_map(|line| {
                let caps = self.links.iter().find_map(|re| re.captures(line))?;
                let link = caps.get(1).or_else(|| caps.get(0))?;
                let display_title = line[..caps.get(0)?.start()]
                    .trim()
                    .trim_end_matches(':')
                    .trim()
                    .to_string();
                let display_title = if display_title.is_empty() {
                    line.trim().to_string()
                } else {
                    display_title
                };
                Some(RawChapter {
                    number: self.extractor.resolve_number(line),
                    display_title,
                    full_chapter_title: None,
                    url: link.as_str().to_string(),
                })
            })
            .collect();

        if raw.is_empty() {
            return Err(ExtractionError::NoChapterListNode);
        }
        Ok(self.extractor.assign_numbers(raw))
    }

    fn extract_content(&self, text: &str, _page_url: &str) -> Result<String, ExtractionError> {
        let cleaned = self.extractor.cleaner().clean(text);
        if cleaned.is_empty() {
            return Err(ExtractionError::NoContentNode);
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::builtin_sources;

    fn scraper() -> PastebinScraper {
        let source = builtin_sources()
            .into_iter()
            .find(|s| s.name == "pastebin_tbate")
            .unwrap();
        PastebinScraper::new(source, 30)
    }

    #[test]
    fn paste_urls_use_raw_endpoint() {
        assert_eq!(
            PastebinScraper::raw_url("https://pastebin.com/AbC123"),
            "https://pastebin.com/raw/AbC123"
        );
        assert_eq!(
            PastebinScraper::raw_url("https://pastebin.com/raw/AbC123"),
            "https://pastebin.com/raw/AbC123"
        );
    }

    #[test]
    fn index_paste_lists_chapters_in_order() {
        let index = "Índice\nCapítulo 2: https://pastebin.com/bbb\nCapítulo 1: https://pastebin.com/aaa\nnotas\n";
        let chapters = scraper()
            .extract_chapters(index, "https://pastebin.com/index")
            .unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].chapter_number, 1);
        assert_eq!(chapters[0].url, "https://pastebin.com/aaa");
        assert_eq!(chapters[0].display_title, "Capítulo 1");
        assert_eq!(chapters[1].chapter_number, 2);
    }

    #[test]
    fn content_is_cleaned_plain_text() {
        let text = "Capítulo 3: 01/02/2023 publicado\r\n\r\nArthur abrió los ojos.\r\n\r\n\r\nFin.";
        let content = scraper()
            .extract_content(text, "https://pastebin.com/ccc")
            .unwrap();
        assert_eq!(content, "Arthur abrió los ojos.\n\nFin.");
    }
}
