//! Edge case and stress tests for fos-content
//!
//! Tests chunk boundaries, eviction order, contract violations and
//! resource limits.

use std::io::Cursor;

use fos_content::{
    CacheConfig, CacheStore, Content, ContentError, ContentHandle, HandlerRegistry, RedrawParams,
    ResourceId, Status,
};
use fos_render::DisplayList;
use image::{ImageFormat, Rgba, RgbaImage};

fn registry() -> HandlerRegistry {
    HandlerRegistry::with_defaults(&CacheConfig::default()).unwrap()
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 128, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn load(cache: &CacheStore, registry: &HandlerRegistry, id: &str, mime: &str, bytes: &[u8]) -> ContentHandle {
    load_split(cache, registry, id, mime, &[bytes])
}

fn load_split(cache: &CacheStore, registry: &HandlerRegistry, id: &str, mime: &str, pieces: &[&[u8]]) -> ContentHandle {
    let handle = cache.put(Content::new(id, mime, registry).unwrap()).unwrap();
    handle.create().unwrap();
    for piece in pieces {
        handle.process_data(piece).unwrap();
    }
    handle
}

/// Converted content painted at its natural size
fn rendering(handle: &ContentHandle) -> DisplayList {
    handle.convert(320, 240).unwrap();
    let extent = handle.borrow().extent();
    let mut list = DisplayList::new();
    handle
        .redraw(&mut list, &RedrawParams::new(0.0, 0.0, extent.width as f32, extent.height as f32))
        .unwrap();
    list
}

/// Render `bytes` whole, in two halves and in chunks of `k`
fn renderings(mime: &str, bytes: &[u8], k: usize) -> Vec<DisplayList> {
    let registry = registry();
    let cache = CacheStore::default();
    let mid = bytes.len() / 2;
    let splits: Vec<Vec<&[u8]>> = vec![
        vec![bytes],
        vec![&bytes[..mid], &bytes[mid..]],
        bytes.chunks(k).collect(),
    ];
    splits
        .iter()
        .enumerate()
        .map(|(n, pieces)| rendering(&load_split(&cache, &registry, &format!("split-{}", n), mime, pieces)))
        .collect()
}

// ============================================================================
// CHUNK BOUNDARIES
// ============================================================================

#[test]
fn test_image_chunk_independence() {
    let lists = renderings("image/png", &png_bytes(8, 8), 5);
    assert!(!lists[0].is_empty());
    assert_eq!(lists[0], lists[1]);
    assert_eq!(lists[0], lists[2]);
}

#[test]
fn test_html_chunk_independence() {
    let html = "<html><head><title>Caf\u{e9}</title></head><body><h2>Snow \u{2603}</h2>\
                <p>Some text &amp; an entity split across chunks</p><ul><li>one</li><li>two</li></ul>\
                <pre>\tindented</pre></body></html>";
    let lists = renderings("text/html", html.as_bytes(), 1);
    assert!(lists[0].text_runs().count() >= 4);
    assert_eq!(lists[0], lists[1]);
    assert_eq!(lists[0], lists[2]);
}

#[test]
fn test_text_chunk_independence() {
    let text = "line one <tag> & \u{e9}\n\tline two\n\nlast";
    for k in [1, 2, 3] {
        let lists = renderings("text/plain", text.as_bytes(), k);
        assert_eq!(lists[0], lists[1]);
        assert_eq!(lists[0], lists[2], "chunk size {}", k);
    }
    let lists = renderings("text/plain", text.as_bytes(), 4);
    let runs: Vec<_> = lists[0].text_runs().collect();
    assert_eq!(runs[0], "line one <tag> & \u{e9}");
    assert_eq!(runs[1], "        line two");
}

#[test]
fn test_empty_chunks_are_harmless() {
    let registry = registry();
    let cache = CacheStore::default();
    let png = png_bytes(2, 2);
    let empty: &[u8] = &[];
    let with_empty = load_split(&cache, &registry, "a", "image/png", &[empty, png.as_slice(), empty]);
    let plain = load(&cache, &registry, "b", "image/png", &png);
    assert_eq!(rendering(&with_empty), rendering(&plain));
}

// ============================================================================
// EVICTION
// ============================================================================

#[test]
fn test_lru_order() {
    // Each 16x16 image costs 1 KiB of pixels plus its PNG bytes
    let config = CacheConfig::default().with_budget(3 * 1024 - 1);
    let registry = HandlerRegistry::with_defaults(&config).unwrap();
    let cache = CacheStore::new(&config);
    let png = solid_png(16, 16);

    let cached = |name: &str| {
        let handle = load(&cache, &registry, name, "image/png", &png);
        handle.convert(100, 100).unwrap();
        handle
    };

    let (a, b, c) = (cached("a"), cached("b"), cached("c"));
    drop(a);
    drop(b);
    drop(c);
    assert!(!cache.contains(&ResourceId::new("a")));
    assert!(cache.contains(&ResourceId::new("b")));
    assert!(cache.contains(&ResourceId::new("c")));

    // Touching b makes c the oldest
    drop(cache.get(&ResourceId::new("b")).unwrap());
    drop(cached("d"));
    assert!(!cache.contains(&ResourceId::new("c")));
    assert!(cache.contains(&ResourceId::new("b")));
    assert!(cache.contains(&ResourceId::new("d")));
    assert_eq!(cache.stats().evictions, 2);
}

#[test]
fn test_referenced_entries_survive() {
    let config = CacheConfig::default().with_budget(0);
    let cache = CacheStore::new(&config);
    let registry = registry();
    let id = ResourceId::new("held.txt");

    let handle = load(&cache, &registry, "held.txt", "text/plain", b"some text");
    handle.convert(100, 100).unwrap();
    drop(load(&cache, &registry, "other.txt", "text/plain", b"x"));
    assert!(cache.contains(&id));
    assert_eq!(cache.len(), 1);

    drop(handle);
    assert!(!cache.contains(&id));
    assert!(cache.is_empty());
}

#[test]
fn test_error_entries_pinned_until_purged() {
    let cache = CacheStore::new(&CacheConfig::default().with_budget(0));
    let registry = registry();
    let id = ResourceId::new("bad.png");

    let handle = load(&cache, &registry, "bad.png", "image/png", b"garbage");
    assert!(handle.convert(10, 10).is_err());
    drop(handle);

    let dump = cache.dump();
    assert_eq!(dump.len(), 1);
    assert_eq!(dump[0].status, Status::Error);
    assert!(!dump[0].evictable);

    cache.set_budget(0);
    assert_eq!(cache.get(&id).map(|h| h.status()), Some(Status::Error));

    assert_eq!(cache.purge_errors(), 1);
    assert!(cache.get(&id).is_none());
    assert_eq!(cache.purge_errors(), 0);
}

#[test]
fn test_purge_skips_referenced_errors() {
    let cache = CacheStore::default();
    let handle = load(&cache, &registry(), "bad.jpg", "image/jpeg", b"\xFF\xD8\xFFjunk");
    assert!(handle.convert(10, 10).is_err());
    assert_eq!(cache.purge_errors(), 0);
    drop(handle);
    assert_eq!(cache.purge_errors(), 1);
}

#[test]
fn test_shrinking_budget_evicts() {
    let cache = CacheStore::default();
    let registry = registry();
    for name in ["a.txt", "b.txt", "c.txt"] {
        let handle = load(&cache, &registry, name, "text/plain", b"hello");
        handle.convert(100, 100).unwrap();
    }
    assert_eq!(cache.len(), 3);
    cache.set_budget(0);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().evictions, 3);
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn test_free_mid_fetch_discards_entry() {
    let cache = CacheStore::default();
    let registry = registry();
    let id = ResourceId::new("partial.txt");

    let first = load(&cache, &registry, "partial.txt", "text/plain", b"partial-");
    let watcher = first.clone();
    cache.free(first);
    assert!(cache.contains(&id));
    cache.free(watcher);

    assert!(cache.get(&id).is_none());
    assert!(cache.is_empty());

    let second = load(&cache, &registry, "partial.txt", "text/plain", b"full body");
    second.convert(100, 100).unwrap();
    assert_eq!(second.borrow().source(), b"full body");
    assert_eq!(second.status(), Status::Ready);
}

#[test]
fn test_free_before_create_discards_entry() {
    let cache = CacheStore::default();
    let id = ResourceId::new("never.html");
    let handle = cache.put(Content::new(id.clone(), "text/html", &registry()).unwrap()).unwrap();
    assert_eq!(handle.status(), Status::Empty);
    drop(handle);
    assert!(cache.get(&id).is_none());
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_destroy_mid_fetch_with_second_handle() {
    let cache = CacheStore::default();
    let registry = registry();
    let id = ResourceId::new("stream.png");

    let fetcher = load_split(&cache, &registry, "stream.png", "image/png", &[&png_bytes(4, 4)[..10]]);
    let viewer = cache.get(&id).unwrap();
    fetcher.destroy().unwrap();

    assert_eq!(viewer.status(), Status::Destroyed);
    assert!(matches!(viewer.process_data(b"more"), Err(ContentError::Destroyed)));
    assert!(matches!(viewer.convert(4, 4), Err(ContentError::Destroyed)));
    assert!(cache.get(&id).is_none());
    // Still in the table until the last handle goes
    assert_eq!(cache.len(), 1);

    drop(fetcher);
    assert_eq!(cache.len(), 1);
    drop(viewer);
    assert!(cache.is_empty());

    let fresh = load(&cache, &registry, "stream.png", "image/png", &png_bytes(4, 4));
    fresh.convert(10, 10).unwrap();
    assert_eq!(fresh.ref_count(), 1);
}

// ============================================================================
// CONTRACT VIOLATIONS
// ============================================================================

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "content already cached")]
fn test_duplicate_put_panics_in_debug() {
    let cache = CacheStore::default();
    let registry = registry();
    let _first = cache.put(Content::new("dup", "text/plain", &registry).unwrap()).unwrap();
    let _second = cache.put(Content::new("dup", "text/plain", &registry).unwrap());
}

#[test]
#[cfg(not(debug_assertions))]
fn test_duplicate_put_rejected_in_release() {
    let cache = CacheStore::default();
    let registry = registry();
    let _first = cache.put(Content::new("dup", "text/plain", &registry).unwrap()).unwrap();
    let second = cache.put(Content::new("dup", "text/plain", &registry).unwrap());
    assert!(matches!(second, Err(ContentError::DuplicateEntry(_))));
}

#[test]
fn test_destroyed_entry_can_be_replaced() {
    let cache = CacheStore::default();
    let registry = registry();
    let id = ResourceId::new("again.txt");

    let old = load(&cache, &registry, "again.txt", "text/plain", b"old");
    let old_copy = old.clone();
    old.destroy().unwrap();
    assert!(cache.get(&id).is_none());

    let new = load(&cache, &registry, "again.txt", "text/plain", b"new");
    drop(old);
    drop(old_copy);
    assert_eq!(new.ref_count(), 1);
    assert_eq!(new.status(), Status::Fetching);
    assert_eq!(new.borrow().source(), b"new");
}

#[test]
fn test_many_references() {
    let cache = CacheStore::default();
    let first = load(&cache, &registry(), "many", "text/plain", b"x");
    let handles: Vec<_> = (0..1000).map(|_| first.clone()).collect();
    assert_eq!(first.ref_count(), 1001);
    drop(handles);
    assert_eq!(first.ref_count(), 1);
}

// ============================================================================
// RESOURCE LIMITS
// ============================================================================

#[test]
fn test_image_over_limits_is_error_not_crash() {
    let config = CacheConfig::default().with_image_limits(256, 8);
    let registry = HandlerRegistry::with_defaults(&config).unwrap();
    let cache = CacheStore::new(&config);
    let handle = load(&cache, &registry, "big.png", "image/png", &png_bytes(16, 16));
    let err = handle.convert(10, 10).unwrap_err();
    assert!(matches!(err, ContentError::ConversionFailed(_)));
    assert_eq!(handle.status(), Status::Error);
}

#[test]
fn test_empty_image_is_error() {
    let cache = CacheStore::default();
    let handle = load(&cache, &registry(), "empty.png", "image/png", &[]);
    assert!(handle.convert(10, 10).is_err());
    assert_eq!(handle.status(), Status::Error);
}

#[test]
fn test_large_text_document() {
    let text: String = (0..2000).map(|i| format!("line {} with some words\n", i)).collect();
    let lists = renderings("text/plain", text.as_bytes(), 4096);
    assert_eq!(lists[0], lists[2]);
    assert_eq!(lists[0].text_runs().count(), 2000);
}
