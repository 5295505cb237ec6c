//! 内容提取器 (Content Extractor)
//!
//! 完全由站点配置的选择器与正则驱动：书籍元数据、章节目录、章节正文。
//! 可选字段缺失时返回空值；只有目录与正文节点是必需的。

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

use crate::core::error::ExtractionError;
use crate::core::model::{ChapterCandidate, NovelInfo, NovelStatus};
use crate::core::source::{ContentType, SourceConfig};
use crate::sites::clean::TextCleaner;
use crate::utils::{resolve_base, to_absolute_url};

/// 正文中不参与文本转换的节点
const SKIPPED_TAGS: [&str; 6] = ["script", "style", "iframe", "noscript", "embed", "object"];

/// 行内元素：文本并入所在段落，不单独成段
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "cite", "em", "font", "i", "mark", "small", "span", "strong", "sub", "sup",
    "u",
];

static IMG: OnceLock<Selector> = OnceLock::new();

fn default_images() -> &'static Selector {
    IMG.get_or_init(|| Selector::parse("img").expect("static selector"))
}

/// 目录提取的中间结果，编号尚未最终确定
#[derive(Debug, Clone)]
pub struct RawChapter {
    pub display_title: String,
    pub full_chapter_title: Option<String>,
    pub url: String,
    pub number: Option<u32>,
}

/// 针对单个站点预编译的提取规则
#[derive(Debug, Clone)]
pub struct Extractor {
    source_name: String,
    base_url: String,
    content_type: ContentType,
    selectors: HashMap<String, Selector>,
    invalid: HashMap<String, String>,
    number_patterns: Vec<Regex>,
    ongoing_keywords: Vec<String>,
    cleaner: TextCleaner,
    min_chapter_warning: usize,
}

impl Extractor {
    pub fn new(source: &SourceConfig, min_chapter_warning: usize) -> Self {
        let mut selectors = HashMap::new();
        let mut invalid = HashMap::new();
        for (label, raw) in &source.selectors {
            if raw.trim().is_empty() {
                continue;
            }
            match Selector::parse(raw) {
                Ok(sel) => {
                    selectors.insert(label.clone(), sel);
                }
                Err(e) => {
                    warn!("[{}] 选择器 {} 无法解析 ({}): {}", source.name, label, raw, e);
                    invalid.insert(label.clone(), raw.clone());
                }
            }
        }

        let number_patterns = source
            .patterns("chapter_number")
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("[{}] chapter_number 正则无法解析 {:?}: {}", source.name, p, e);
                    None
                }
            })
            .collect();

        let ongoing_keywords = match source.patterns("status_ongoing") {
            [] => vec!["ongoing".to_string()],
            keywords => keywords.iter().map(|k| k.to_lowercase()).collect(),
        };

        Self {
            source_name: source.name.clone(),
            base_url: source.base_url.clone(),
            content_type: source.content_type,
            selectors,
            invalid,
            number_patterns,
            ongoing_keywords,
            cleaner: TextCleaner::for_source(source),
            min_chapter_warning,
        }
    }

    pub fn cleaner(&self) -> &TextCleaner {
        &self.cleaner
    }

    fn optional(&self, label: &str) -> Option<&Selector> {
        self.selectors.get(label)
    }

    fn required(&self, label: &'static str) -> Result<&Selector, ExtractionError> {
        if let Some(sel) = self.selectors.get(label) {
            return Ok(sel);
        }
        match self.invalid.get(label) {
            Some(raw) => Err(ExtractionError::InvalidSelector {
                label: label.to_string(),
                selector: raw.clone(),
            }),
            None => Err(ExtractionError::MissingSelector(label)),
        }
    }

    fn parse(html: &str) -> Result<Html, ExtractionError> {
        if html.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }
        Ok(Html::parse_document(html))
    }

    fn absolute(&self, page_url: &str, href: &str) -> String {
        match resolve_base(page_url, &self.base_url) {
            Some(base) => to_absolute_url(&base, href),
            None => href.trim().to_string(),
        }
    }

    // ------------------------------------------------------------------
    // 书籍元数据
    // ------------------------------------------------------------------

    pub fn novel_info(&self, html: &str, page_url: &str) -> Result<NovelInfo, ExtractionError> {
        let doc = Self::parse(html)?;
        let root = doc.root_element();

        let first = |label: &str| self.optional(label).and_then(|sel| root.select(sel).next());

        let title = first("title").and_then(|el| non_empty(inline_text(el)));
        let author = first("author").and_then(|el| non_empty(inline_text(el)));
        let description = first("description").and_then(|el| {
            if el.value().name() == "meta" {
                el.value().attr("content").and_then(|c| non_empty(c.trim().to_string()))
            } else {
                non_empty(block_text(el, "\n"))
            }
        });
        let cover_image_url = first("cover_image")
            .and_then(image_source)
            .map(|src| self.absolute(page_url, src));
        let status = first("status").map(|el| self.status_of(&inline_text(el)));

        let mut tags: Vec<String> = Vec::new();
        if let Some(sel) = self.optional("tags") {
            for tag in root.select(sel).filter_map(|el| non_empty(inline_text(el))) {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }

        if title.is_none() {
            debug!("[{}] 未提取到标题: {}", self.source_name, page_url);
        }

        Ok(NovelInfo {
            title,
            author,
            description,
            cover_image_url,
            status,
            tags,
            source_url: page_url.to_string(),
            source_name: self.source_name.clone(),
        })
    }

    fn status_of(&self, text: &str) -> NovelStatus {
        let lowered = text.to_lowercase();
        if self.ongoing_keywords.iter().any(|k| lowered.contains(k.as_str())) {
            NovelStatus::Ongoing
        } else {
            NovelStatus::Completed
        }
    }

    // ------------------------------------------------------------------
    // 章节目录
    // ------------------------------------------------------------------

    pub fn chapter_index(
        &self,
        html: &str,
        page_url: &str,
    ) -> Result<Vec<ChapterCandidate>, ExtractionError> {
        let list_sel = self.required("chapter_list")?;
        let link_sel = self.required("chapter_link")?;
        let doc = Self::parse(html)?;

        let items: Vec<ElementRef> = doc.select(list_sel).collect();
        if items.is_empty() {
            return Err(ExtractionError::NoChapterListNode);
        }

        let title_sel = self.optional("chapter_title");
        let number_sel = self.optional("chapter_number");

        let raw: Vec<RawChapter> = items
            .into_iter()
            .filter_map(|item| {
                let link = item
                    .select(link_sel)
                    .next()
                    .or_else(|| link_sel.matches(&item).then_some(item))?;
                let href = link.value().attr("href").map(str::trim).filter(|h| !h.is_empty())?;

                let link_text = inline_text(link);
                let display_title = title_sel
                    .and_then(|sel| item.select(sel).next())
                    .map(inline_text)
                    .filter(|t| !t.is_empty())
                    .or_else(|| non_empty(link_text.clone()))
                    .or_else(|| link.value().attr("title").map(|t| t.trim().to_string()))
                    .unwrap_or_default();

                let full_chapter_title = link
                    .value()
                    .attr("title")
                    .map(str::trim)
                    .filter(|t| !t.is_empty() && *t != display_title)
                    .map(str::to_string);

                let number = number_sel
                    .and_then(|sel| item.select(sel).next())
                    .and_then(|el| self.number_from_text(&inline_text(el)))
                    .or_else(|| self.resolve_number(&display_title));

                Some(RawChapter {
                    display_title,
                    full_chapter_title,
                    url: self.absolute(page_url, href),
                    number,
                })
            })
            .collect();

        Ok(self.assign_numbers(raw))
    }

    /// 按 `chapter_number` 正则解析编号，取第一个捕获组
    pub fn resolve_number(&self, title: &str) -> Option<u32> {
        self.number_patterns.iter().find_map(|re| {
            let caps = re.captures(title)?;
            let m = caps.get(1).or_else(|| caps.get(0))?;
            first_integer(m.as_str())
        })
    }

    /// 独立编号节点：先套用正则，再取第一个整数
    fn number_from_text(&self, text: &str) -> Option<u32> {
        self.resolve_number(text).or_else(|| first_integer(text))
    }

    /// 未解析出编号的条目使用列表位置 (从 1 开始)，最后按编号升序
    pub fn assign_numbers(&self, raw: Vec<RawChapter>) -> Vec<ChapterCandidate> {
        let mut chapters: Vec<ChapterCandidate> = raw
            .into_iter()
            .enumerate()
            .map(|(idx, ch)| {
                let position = idx as u32 + 1;
                let (chapter_number, number_inferred) = match ch.number {
                    Some(n) => (n, false),
                    None => {
                        debug!(
                            "[{}] 标题 {:?} 未匹配编号，使用位置 {}",
                            self.source_name, ch.display_title, position
                        );
                        (position, true)
                    }
                };
                ChapterCandidate {
                    display_title: ch.display_title,
                    full_chapter_title: ch.full_chapter_title,
                    chapter_number,
                    url: ch.url,
                    number_inferred,
                }
            })
            .collect();

        chapters.sort_by_key(|c| c.chapter_number);

        let inferred = chapters.iter().filter(|c| c.number_inferred).count();
        if inferred > 0 {
            warn!("[{}] {} 个章节使用了位置编号", self.source_name, inferred);
        }
        if chapters.len() < self.min_chapter_warning {
            warn!(
                "[{}] 仅发现 {} 个章节 (低于 {})，页面可能未完整加载",
                self.source_name,
                chapters.len(),
                self.min_chapter_warning
            );
        }
        chapters
    }

    // ------------------------------------------------------------------
    // 章节正文
    // ------------------------------------------------------------------

    pub fn chapter_content(&self, html: &str, page_url: &str) -> Result<String, ExtractionError> {
        match self.content_type {
            ContentType::Novel => self.novel_content(html),
            ContentType::Manhwa => self.manhwa_content(html, page_url),
        }
    }

    fn novel_content(&self, html: &str) -> Result<String, ExtractionError> {
        let content_sel = self.required("chapter_content")?;
        let doc = Self::parse(html)?;
        let node = doc
            .select(content_sel)
            .next()
            .ok_or(ExtractionError::NoContentNode)?;

        Ok(self.cleaner.clean(&block_text(node, "\n\n")))
    }

    /// 条漫正文为图片地址列表 (每行一个)
    fn manhwa_content(&self, html: &str, page_url: &str) -> Result<String, ExtractionError> {
        let doc = Self::parse(html)?;
        let root = match self.optional("chapter_content") {
            Some(sel) => doc.select(sel).next().ok_or(ExtractionError::NoContentNode)?,
            None => doc.root_element(),
        };
        let images = self.optional("chapter_images").unwrap_or_else(|| default_images());

        let mut urls: Vec<String> = Vec::new();
        for src in root.select(images).filter_map(image_source) {
            let url = self.absolute(page_url, src);
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }

        if urls.is_empty() {
            return Err(ExtractionError::NoContentNode);
        }
        Ok(urls.join("\n"))
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// 行内文本：合并空白
fn inline_text(el: ElementRef) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// 块级文本：段落之间以分隔符连接，行内元素与相邻文字留在同一段，跳过脚本类节点
fn block_text(el: ElementRef, separator: &str) -> String {
    let mut blocks = TextBlocks::default();
    blocks.walk(el);
    blocks.finish().join(separator)
}

#[derive(Default)]
struct TextBlocks {
    done: Vec<String>,
    current: String,
}

impl TextBlocks {
    fn walk(&mut self, el: ElementRef) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.current.push_str(text),
                Node::Element(element) if !SKIPPED_TAGS.contains(&element.name()) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if INLINE_TAGS.contains(&element.name()) {
                        self.walk(child_el);
                    } else {
                        self.flush();
                        self.walk(child_el);
                        self.flush();
                    }
                }
                _ => {}
            }
        }
    }

    fn flush(&mut self) {
        let block = normalize_block(&self.current);
        if !block.is_empty() {
            self.done.push(block);
        }
        self.current.clear();
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.done
    }
}

/// 每行合并空白，丢弃空行
fn normalize_block(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn image_source(el: ElementRef) -> Option<&str> {
    ["src", "data-src"]
        .iter()
        .filter_map(|attr| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty() && !v.starts_with("data:"))
}

fn first_integer(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}
