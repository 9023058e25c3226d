//! Product page paths.

/// Build the storefront path of a product page.
///
/// `{locale}`, `{urlKey}` and `{sku}` placeholders in `format` are
/// substituted, repeated slashes collapsed and the result lowercased.
///
/// # Examples
/// ```
/// use change_detector::utils::url::product_path;
///
/// assert_eq!(
///     product_path("/{locale}/products/{urlKey}/{sku}", "Red-Shirt", "SKU-1", Some("en")),
///     "/en/products/red-shirt/sku-1"
/// );
/// ```
pub fn product_path(format: &str, url_key: &str, sku: &str, locale: Option<&str>) -> String {
    let path = format
        .replace("{locale}", locale.unwrap_or(""))
        .replace("{urlKey}", url_key)
        .replace("{sku}", &sku_slug(sku));

    let mut out = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        out.push('/');
    }
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out.to_lowercase()
}

/// SKUs may contain characters that are not path safe.
fn sku_slug(sku: &str) -> String {
    sku.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}
