//! HTML 片段渲染，文件名统一转义。

use askama::Template;

use crate::catalog::ImageRecord;
use crate::config::IMAGE_LIST_WIDTH;

#[derive(Template)]
#[template(source = "<img src='/{{ name }}' />", ext = "html")]
struct ImageTag<'a> {
    name: &'a str,
}

#[derive(Template)]
#[template(
    source = "{% for image in images %}<img width='{{ width }}' src='/{{ image.name }}' /><br/>{% endfor %}",
    ext = "html"
)]
struct ImageList<'a> {
    images: &'a [ImageRecord],
    width: u32,
}

#[derive(Template)]
#[template(
    source = r#"<p>PDF Uploaded: <a href="/pdf/{{ name }}" target="_blank">{{ name }}</a></p>"#,
    ext = "html"
)]
struct PdfLink<'a> {
    name: &'a str,
}

#[derive(Template)]
#[template(
    source = r#"<h2>Uploaded PDFs:</h2>{% for name in names %}<p><a href="/pdf/{{ name }}" target="_blank">{{ name }}</a></p>{% endfor %}"#,
    ext = "html"
)]
struct PdfList<'a> {
    names: &'a [String],
}

pub fn image_tag(name: &str) -> askama::Result<String> {
    ImageTag { name }.render()
}

/// Empty log renders as an empty string.
pub fn image_list(images: &[ImageRecord]) -> askama::Result<String> {
    ImageList {
        images,
        width: IMAGE_LIST_WIDTH,
    }
    .render()
}

pub fn pdf_link(name: &str) -> askama::Result<String> {
    PdfLink { name }.render()
}

pub fn pdf_list(names: &[String]) -> askama::Result<String> {
    PdfList { names }.render()
}
