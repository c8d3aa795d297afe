//! Decoding of the `item_bytes` blob attached to every auction.
//!
//! The blob is base64 of a gzipped NBT document whose root compound holds an
//! `i` list with exactly one item stack.

use std::io::Read;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use serde::Deserialize;
use thiserror::Error;

/// Item fields extracted from an auction's `item_bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMeta {
    /// SkyBlock item id (`ExtraAttributes.id`), e.g. `ENCHANTED_DIAMOND`.
    pub item_id: String,
    /// Display name with `§` formatting codes removed.
    pub item_name: Option<String>,
    /// Stack size.
    pub count: i64,
}

#[derive(Debug, Error)]
pub enum ItemDecodeError {
    #[error("not base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("not gzip: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("not NBT: {0}")]
    Nbt(#[from] fastnbt::error::Error),

    #[error("no item stack in blob")]
    Empty,

    #[error("missing ExtraAttributes.id")]
    MissingId,

    #[error("invalid stack size {0}")]
    Count(i8),
}

#[derive(Deserialize)]
struct ItemBlob {
    #[serde(default)]
    i: Vec<ItemStack>,
}

#[derive(Deserialize)]
struct ItemStack {
    #[serde(rename = "Count")]
    count: i8,
    #[serde(default)]
    tag: Option<ItemTag>,
}

#[derive(Deserialize)]
struct ItemTag {
    #[serde(default)]
    display: Option<Display>,
    #[serde(rename = "ExtraAttributes", default)]
    extra_attributes: Option<ExtraAttributes>,
}

#[derive(Deserialize)]
struct Display {
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ExtraAttributes {
    #[serde(default)]
    id: Option<String>,
}

/// Decode base64 + gzip + NBT into [`ItemMeta`].
pub fn decode_item_bytes(encoded: &str) -> Result<ItemMeta, ItemDecodeError> {
    let compressed = STANDARD.decode(encoded.trim())?;
    let mut nbt = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut nbt)?;
    let blob: ItemBlob = fastnbt::from_bytes(&nbt)?;

    let stack = blob.i.into_iter().next().ok_or(ItemDecodeError::Empty)?;
    if stack.count <= 0 {
        return Err(ItemDecodeError::Count(stack.count));
    }
    let tag = stack.tag;
    let item_id = tag
        .as_ref()
        .and_then(|t| t.extra_attributes.as_ref())
        .and_then(|e| e.id.clone())
        .filter(|id| !id.is_empty())
        .ok_or(ItemDecodeError::MissingId)?;
    let item_name = tag
        .and_then(|t| t.display)
        .and_then(|d| d.name)
        .map(|n| strip_formatting(&n));

    Ok(ItemMeta {
        item_id,
        item_name,
        count: i64::from(stack.count),
    })
}

/// Remove Minecraft `§x` formatting codes.
fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '§' {
            chars.next();
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// `§aEnchanted Diamond` x4, id `ENCHANTED_DIAMOND`.
    pub const ENCHANTED_DIAMOND_X4: &str = "H4sIAAAAAAAC/xWOzW6CQBRGPyhWnE1j4qJLFm5p/MFYl8QhaRPFjV03l5kBJylDA5ekfSLfwycT1yc55whgAs8KAJ4P32ov9DDaN73jQOCJqRIYa9v9/tB/iCCn2mB2u1Lm1IUcGx1JS3Xj9ATBoWlN+BDh9XbdfnUD5CZSLZUc8cW6qnuDwEv2xy2lzK0tejZd+KhimuX7jzQ/Z/JbfqbHUy6HWt8PZJ6UK7XQWxMvaV3EidroeGfey3hBy2Kl1joxmxLw8SyppsoMA7gDzLOkxtYAAAA=";

    /// Item stack whose `ExtraAttributes` has no `id`.
    pub const MISSING_ID: &str = "H4sIAAAAAAAC/xXNMY6CQBQG4H9YXXEaW0uKbTGCGLU0amGidh7gwbxhJ1lkM/NI5ETew5OpF/g+DYyhnAagIkTOqFhhuGu7myiNL6FaY2Rc+P+jPsbgQg1j8nzYcx+EfZ8chZsxBqfWc/wxMH0+VtfAJpE2qTxZSeTX3eowg8bkcBdPWxHvyk44vMGucwY/hc2ruVlxmtGiTItqadINr206p6zMq4UpeGmBCN97aqjmd4QXoXosX7kAAAA=";
}
