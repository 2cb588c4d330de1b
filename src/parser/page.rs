// Generic product-page field extraction shared by the site strategies.
use crate::model::{ExtractionError, NumberOrText};
use ::scraper::{Html, Selector};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageFields {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub rating: Option<NumberOrText>,
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::Parse(format!("bad selector {}: {}", css, e)))
}

fn clean(text: String) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() { None } else { Some(collapsed) }
}

/// First non-empty text of any element matching one of `candidates`.
fn first_text(doc: &Html, candidates: &[&str]) -> Result<Option<String>, ExtractionError> {
    for css in candidates {
        let sel = selector(css)?;
        if let Some(found) = doc.select(&sel).find_map(|el| clean(el.text().collect())) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// First non-empty `attr` of any element matching one of `candidates`.
fn first_attr(doc: &Html, candidates: &[&str], attr: &str) -> Result<Option<String>, ExtractionError> {
    for css in candidates {
        let sel = selector(css)?;
        if let Some(found) = doc
            .select(&sel)
            .find_map(|el| el.value().attr(attr).and_then(|v| clean(v.to_string())))
        {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn parse_rating(raw: String) -> NumberOrText {
    match raw.replace(',', ".").parse::<f64>() {
        Ok(value) => NumberOrText::Number(value),
        Err(_) => NumberOrText::Text(raw),
    }
}

pub fn extract_fields(html: &str) -> Result<PageFields, ExtractionError> {
    let doc = Html::parse_document(html);

    let name = match first_text(&doc, &["h1.product-title", "h1.ui-pdp-title", "h1"])? {
        Some(name) => Some(name),
        None => first_attr(&doc, &[r#"meta[property="og:title"]"#], "content")?,
    };

    let image_url = match first_attr(&doc, &[r#"meta[property="og:image"]"#], "content")? {
        Some(url) => Some(url),
        None => first_attr(&doc, &["img.product-image", r#"img[itemprop="image"]"#], "src")?,
    };

    let description = match first_attr(&doc, &[r#"meta[name="description"]"#], "content")? {
        Some(text) => Some(text),
        None => first_text(&doc, &["div.description", r#"[itemprop="description"]"#])?,
    };

    let price = match first_attr(&doc, &[r#"meta[itemprop="price"]"#], "content")? {
        Some(price) => Some(price),
        None => first_text(&doc, &["span.price-tag", ".andes-money-amount", r#"[itemprop="price"]"#])?,
    };

    let rating = match first_attr(&doc, &[r#"meta[itemprop="ratingValue"]"#], "content")? {
        Some(raw) => Some(raw),
        None => first_text(&doc, &["span.rating", r#"[itemprop="ratingValue"]"#])?,
    }
    .map(parse_rating);

    Ok(PageFields { name, image_url, description, price, rating })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_structured_fields() {
        let html = r#"
            <html><head>
              <meta property="og:image" content="https://img.test/phone.jpg">
              <meta name="description" content="  A   great phone ">
            </head><body>
              <h1 class="product-title"> Galaxy   S23 </h1>
              <span class="price-tag">$799.99</span>
              <span class="rating">4,6</span>
            </body></html>"#;

        let fields = extract_fields(html).unwrap();

        assert_eq!(fields.name.as_deref(), Some("Galaxy S23"));
        assert_eq!(fields.image_url.as_deref(), Some("https://img.test/phone.jpg"));
        assert_eq!(fields.description.as_deref(), Some("A great phone"));
        assert_eq!(fields.price.as_deref(), Some("$799.99"));
        assert_eq!(fields.rating, Some(NumberOrText::Number(4.6)));
    }

    #[test]
    fn falls_back_to_meta_title_and_text_rating() {
        let html = r#"
            <html><head><meta property="og:title" content="Moto Edge 30"></head>
            <body><span itemprop="ratingValue">great</span></body></html>"#;

        let fields = extract_fields(html).unwrap();

        assert_eq!(fields.name.as_deref(), Some("Moto Edge 30"));
        assert_eq!(fields.rating, Some(NumberOrText::Text("great".into())));
        assert_eq!(fields.price, None);
        assert_eq!(fields.image_url, None);
    }

    #[test]
    fn empty_page_yields_no_fields() {
        assert_eq!(extract_fields("<html></html>").unwrap(), PageFields::default());
    }
}
