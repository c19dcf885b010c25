use crate::asset::AssetError;
use common::glm::Vec4;
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasRegion {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rotate: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasPage {
    /// Image file name, relative to the atlas file.
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<AtlasRegion>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpineAtlas {
    pub pages: Vec<AtlasPage>,
}

fn parse_pair(value: &str) -> Option<(u32, u32)> {
    let mut it = value.split(',').map(|v| v.trim().parse::<u32>());
    match (it.next(), it.next()) {
        (Some(Ok(a)), Some(Ok(b))) => Some((a, b)),
        _ => None,
    }
}

fn atlas_error(line: usize, msg: &str) -> AssetError {
    AssetError::Spine(format!("atlas line {}: {}", line + 1, msg))
}

/// Parses the libGDX text atlas written by the Spine editor.
/// Both the `xy`/`size` and the newer `bounds` region notations are accepted.
pub fn parse_atlas(text: &str) -> Result<SpineAtlas, AssetError> {
    let mut atlas = SpineAtlas::default();
    let mut page: Option<AtlasPage> = None;
    let mut region: Option<AtlasRegion> = None;

    for (i, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();

        if line.is_empty() {
            if let Some(mut page) = page.take() {
                page.regions.extend(region.take());
                atlas.pages.push(page);
            }
            continue;
        }

        let indented = raw_line.starts_with(char::is_whitespace);
        let Some(page_ref) = page.as_mut() else {
            page = Some(AtlasPage {
                file: line.to_owned(),
                width: 0,
                height: 0,
                regions: vec![],
            });
            continue;
        };

        match line.split_once(':') {
            Some((key, value)) if indented || region.is_some() => {
                let region = region
                    .as_mut()
                    .ok_or_else(|| atlas_error(i, "region property outside of a region"))?;
                let value = value.trim();
                match key.trim() {
                    "xy" => {
                        (region.x, region.y) = parse_pair(value).ok_or_else(|| atlas_error(i, "invalid xy"))?;
                    }
                    "size" => {
                        (region.width, region.height) =
                            parse_pair(value).ok_or_else(|| atlas_error(i, "invalid size"))?;
                    }
                    "bounds" => {
                        let v: Vec<u32> = value.split(',').filter_map(|v| v.trim().parse().ok()).collect();
                        if v.len() != 4 {
                            return Err(atlas_error(i, "invalid bounds"));
                        }
                        (region.x, region.y, region.width, region.height) = (v[0], v[1], v[2], v[3]);
                    }
                    "rotate" => region.rotate = value != "false" && value != "0",
                    _ => {}
                }
            }
            Some((key, value)) => {
                if key.trim() == "size" {
                    (page_ref.width, page_ref.height) =
                        parse_pair(value.trim()).ok_or_else(|| atlas_error(i, "invalid page size"))?;
                }
            }
            None => {
                page_ref.regions.extend(region.take());
                region = Some(AtlasRegion {
                    name: line.to_owned(),
                    x: 0,
                    y: 0,
                    width: 0,
                    height: 0,
                    rotate: false,
                });
            }
        }
    }

    if let Some(mut page) = page.take() {
        page.regions.extend(region.take());
        atlas.pages.push(page);
    }
    if atlas.pages.is_empty() {
        return Err(AssetError::Spine("atlas has no pages".to_owned()));
    }
    Ok(atlas)
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SkeletonHeader {
    pub spine: Option<String>,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<String>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SlotData {
    pub name: String,
    pub bone: String,
    pub attachment: Option<String>,
}

/// The parts of a Spine skeleton JSON export the renderer uses.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SkeletonData {
    pub skeleton: SkeletonHeader,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    /// Skins are a name-keyed object before Spine 3.8 and an array of named objects since.
    skins: serde_json::Value,
}

impl SkeletonData {
    pub fn skin_names(&self) -> Vec<String> {
        match &self.skins {
            serde_json::Value::Object(map) => map.keys().cloned().collect(),
            serde_json::Value::Array(skins) => skins
                .iter()
                .filter_map(|skin| skin.get("name").and_then(|n| n.as_str()).map(str::to_owned))
                .collect(),
            _ => vec![],
        }
    }
}

pub fn parse_skeleton(json: &[u8]) -> Result<SkeletonData, AssetError> {
    let skeleton: SkeletonData =
        serde_json::from_slice(json).map_err(|e| AssetError::Spine(format!("skeleton: {}", e)))?;
    if skeleton.bones.is_empty() {
        return Err(AssetError::Spine("skeleton has no bones".to_owned()));
    }
    Ok(skeleton)
}

/// A registered Spine skeleton together with the atlas of its page texture.
pub struct SpineAsset {
    pub atlas: SpineAtlas,
    pub skeleton: SkeletonData,
    pub texture_id: u32,
}

impl SpineAsset {
    pub fn page(&self) -> &AtlasPage {
        // `parse_atlas` guarantees at least one page.
        &self.atlas.pages[0]
    }

    /// Skeleton bounds, falling back to the page size for exports without them.
    pub fn size(&self) -> (u32, u32) {
        let header = &self.skeleton.skeleton;
        if header.width > 0.0 && header.height > 0.0 {
            (header.width.round() as u32, header.height.round() as u32)
        } else {
            (self.page().width, self.page().height)
        }
    }

    /// UV rectangle `(u0, v0, u1, v1)` of the region shown by the first slot's
    /// setup-pose attachment, or of the first region when no slot names one.
    pub fn default_region_uv(&self) -> Vec4 {
        let page = self.page();
        let attachment = self.skeleton.slots.iter().find_map(|s| s.attachment.as_deref());
        let region = attachment
            .and_then(|name| page.regions.iter().find(|r| r.name == name))
            .or_else(|| page.regions.first());

        match region {
            Some(r) if page.width > 0 && page.height > 0 => {
                let (w, h) = (page.width as f32, page.height as f32);
                let (rw, rh) = if r.rotate {
                    (r.height, r.width)
                } else {
                    (r.width, r.height)
                };
                Vec4::new(
                    r.x as f32 / w,
                    r.y as f32 / h,
                    (r.x + rw) as f32 / w,
                    (r.y + rh) as f32 / h,
                )
            }
            _ => Vec4::new(0.0, 0.0, 1.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ATLAS: &str = "
hero.png
size: 256,128
format: RGBA8888
filter: Linear,Linear
repeat: none
head
  rotate: false
  xy: 2, 2
  size: 64, 32
  orig: 64, 32
  offset: 0, 0
  index: -1
body
  bounds: 70,2,32,64
  rotate: 90
";

    const SKELETON: &str = r#"{
        "skeleton": { "spine": "3.8.99", "width": 120.4, "height": 200 },
        "bones": [ { "name": "root" }, { "name": "torso", "parent": "root", "length": 40 } ],
        "slots": [ { "name": "body", "bone": "torso", "attachment": "body" } ],
        "skins": [ { "name": "default", "attachments": {} } ],
        "animations": { "idle": {} }
    }"#;

    #[test]
    fn atlas_regions_are_parsed() {
        let atlas = parse_atlas(ATLAS).unwrap();
        assert_eq!(atlas.pages.len(), 1);

        let page = &atlas.pages[0];
        assert_eq!(page.file, "hero.png");
        assert_eq!((page.width, page.height), (256, 128));
        assert_eq!(page.regions.len(), 2);
        assert_eq!(
            page.regions[0],
            AtlasRegion {
                name: "head".to_owned(),
                x: 2,
                y: 2,
                width: 64,
                height: 32,
                rotate: false,
            }
        );
        assert_eq!((page.regions[1].x, page.regions[1].height), (70, 64));
        assert!(page.regions[1].rotate);
    }

    #[test]
    fn empty_atlas_is_rejected() {
        assert!(parse_atlas("\n\n").is_err());
        assert!(parse_atlas("page.png\nsize: 1,x\n").is_err());
    }

    #[test]
    fn skeleton_and_default_region() {
        let skeleton = parse_skeleton(SKELETON.as_bytes()).unwrap();
        assert_eq!(skeleton.bones.len(), 2);
        assert_eq!(skeleton.bones[1].parent.as_deref(), Some("root"));
        assert_eq!(skeleton.skin_names(), vec!["default".to_owned()]);

        let asset = SpineAsset {
            atlas: parse_atlas(ATLAS).unwrap(),
            skeleton,
            texture_id: 0,
        };
        assert_eq!(asset.size(), (120, 200));

        let uv = asset.default_region_uv();
        assert_abs_diff_eq!(uv.x, 70.0 / 256.0);
        assert_abs_diff_eq!(uv.y, 2.0 / 128.0);
        assert_abs_diff_eq!(uv.z, 134.0 / 256.0);
        assert_abs_diff_eq!(uv.w, 34.0 / 128.0);
    }

    #[test]
    fn skeleton_without_bones_is_rejected() {
        assert!(parse_skeleton(br#"{"skeleton": {}}"#).is_err());
        assert!(parse_skeleton(b"not json").is_err());
    }
}
