//! HTML内容提取器
//! 负责从HTML中提取页面标题、资源链接（script/img 的 src、link 的 href）以及去标签后的纯文本

use std::cell::{Cell, RefCell};
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts
};
use markup5ever::interface::Attribute;
use tendril::StrTendril;

#[derive(Debug, Default, Clone)]
pub struct HtmlExtractor {
    title: RefCell<Option<String>>,
    links: RefCell<Vec<String>>,
    text: RefCell<String>,
    in_title: Cell<bool>,
    // script/style 内的字符不计入正文
    in_raw_text: Cell<bool>,
}

impl TokenSink for HtmlExtractor {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(Tag {
                kind: TagKind::StartTag,
                name,
                attrs,
                self_closing,
            }) => match name.as_ref() {
                "script" => {
                    self.extract_link(&attrs, "src");
                    self.in_raw_text.set(!self_closing);
                }
                "img" => self.extract_link(&attrs, "src"),
                "link" => self.extract_link(&attrs, "href"),
                "style" => self.in_raw_text.set(!self_closing),
                "title" => {
                    self.in_title.set(!self_closing);
                    self.title.borrow_mut().get_or_insert_with(String::new);
                }
                _ => {}
            },
            Token::TagToken(Tag {
                kind: TagKind::EndTag,
                name,
                ..
            }) => match name.as_ref() {
                "script" | "style" => self.in_raw_text.set(false),
                "title" => self.in_title.set(false),
                _ => {}
            },
            Token::CharacterTokens(chars) => {
                if self.in_raw_text.get() {
                    return TokenSinkResult::Continue;
                }
                if self.in_title.get() {
                    if let Some(title) = self.title.borrow_mut().as_mut() {
                        title.push_str(&chars);
                    }
                }
                self.text.borrow_mut().push_str(&chars);
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

impl HtmlExtractor {
    /// 创建新的提取器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从HTML字符串提取内容
    pub fn extract(&self, html: &str) -> Self {
        let tokenizer = Tokenizer::new(self.clone(), TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from(html));

        let _ = tokenizer.feed(&queue);
        tokenizer.end();

        tokenizer.sink
    }

    fn extract_link(&self, attrs: &[Attribute], attr_name: &str) {
        for attr in attrs {
            if attr.name.local.as_ref() == attr_name {
                let value = attr.value.trim();
                if !value.is_empty() {
                    self.links.borrow_mut().push(value.to_string());
                }
                break;
            }
        }
    }

    /// 页面标题（首个 title 标签，去首尾空白）
    pub fn get_title(&self) -> Option<String> {
        self.title
            .borrow()
            .as_ref()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// 资源链接（文档顺序）
    pub fn get_links(&self) -> Vec<String> {
        self.links.borrow().clone()
    }

    /// 去标签后的纯文本
    pub fn get_text(&self) -> String {
        self.text.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_extractor() {
        let html = r#"
            <html><head>
            <title> Welcome to nginx! </title>
            <link rel="stylesheet" href="/static/site.css">
            <script src="/jquery.min.js"></script>
            <style>body { color: red; }</style>
            </head>
            <body>
            <img src="/logo.png" />
            <p>Hello <b>world</b></p>
            <script>var x = 1;</script>
            </body></html>
        "#;

        let result = HtmlExtractor::new().extract(html);

        assert_eq!(result.get_title(), Some("Welcome to nginx!".to_string()));
        assert_eq!(
            result.get_links(),
            vec![
                "/static/site.css".to_string(),
                "/jquery.min.js".to_string(),
                "/logo.png".to_string()
            ]
        );

        let text = result.get_text();
        assert!(text.contains("Hello world"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_no_title() {
        let result = HtmlExtractor::new().extract("<p>plain</p>");
        assert_eq!(result.get_title(), None);
        assert!(result.get_links().is_empty());
    }
}
