use crate::source::traits::FetchedAsset;

/// Distributable formats a CDN may hand back for a bundle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    EsModule,
    Umd,
    Wasm,
    Json,
    /// Anything unrecognized, including HTML error pages served with a 200.
    Unknown,
}

/// How much of the payload the text sniffer inspects.
const SNIFF_WINDOW: usize = 4096;

/// Detect the bundle format from payload bytes.
pub fn detect_bundle(payload: &[u8]) -> BundleKind {
    // WASM: magic bytes "\0asm" at offset 0.
    if payload.len() >= 4 && &payload[0..4] == b"\0asm" {
        return BundleKind::Wasm;
    }

    let window = &payload[..payload.len().min(SNIFF_WINDOW)];
    let head = String::from_utf8_lossy(window);
    let trimmed = head.trim_start();

    // HTML before JSON: error pages frequently open with a doctype.
    let lower = trimmed.get(..64.min(trimmed.len())).unwrap_or("").to_lowercase();
    if lower.starts_with("<!doctype") || lower.starts_with("<html") {
        return BundleKind::Unknown;
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return BundleKind::Json;
    }

    // ES module: any top-level export form in the sniff window.
    if head.contains("export ")
        || head.contains("export{")
        || head.contains("export default")
        || head.contains("import(")
    {
        return BundleKind::EsModule;
    }

    // UMD: minified preamble plus the exports probe.
    if trimmed.starts_with("!function")
        || trimmed.starts_with("(function")
        || head.contains("typeof exports")
    {
        return BundleKind::Umd;
    }

    BundleKind::Unknown
}

/// Scan a bundle payload for an expected export symbol.
///
/// Works for ES/UMD text and for WASM binaries, where export names appear
/// verbatim in the export section.
pub fn contains_export(payload: &[u8], symbol: &str) -> bool {
    let needle = symbol.as_bytes();
    if needle.is_empty() || payload.len() < needle.len() {
        return false;
    }
    payload
        .windows(needle.len())
        .any(|window| window == needle)
}

/// Classify a fetched asset, preferring its declared content type as a hint
/// when the payload itself is ambiguous.
pub fn classify_asset(asset: &FetchedAsset) -> BundleKind {
    let sniffed = detect_bundle(&asset.bytes);
    if sniffed != BundleKind::Unknown {
        return sniffed;
    }
    match asset.content_type.as_deref() {
        Some(ct) if ct.contains("wasm") => BundleKind::Wasm,
        Some(ct) if ct.contains("json") => BundleKind::Json,
        Some(ct) if ct.contains("javascript") => BundleKind::Umd,
        _ => BundleKind::Unknown,
    }
}
