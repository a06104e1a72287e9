//! md5anim 解析
//!
//! 每帧只存储被标记为动画的分量，其余分量取自基准帧。

use glam::Vec3;

use crate::loader::tokenizer::{Token, Tokenizer};
use crate::loader::{check_parent, quat_from_xyz, read_version};
use crate::skeleton::JointTransform;
use crate::{Md5Error, Result};

use super::{AnimationClip, BaseFrame, Bounds, Frame};

const TX: u32 = 1 << 0;
const TY: u32 = 1 << 1;
const TZ: u32 = 1 << 2;
const QX: u32 = 1 << 3;
const QY: u32 = 1 << 4;
const QZ: u32 = 1 << 5;

/// 层级项：关节名、父索引、动画分量标记与起始下标
struct HierarchyEntry {
    name: String,
    parent: i32,
    flags: u32,
    start: usize,
}

/// 基准帧中的原始分量（四元数只有虚部）
#[derive(Clone, Copy)]
struct RawTransform {
    position: Vec3,
    orientation: Vec3,
}

#[derive(Default)]
struct Header {
    num_frames: Option<usize>,
    num_joints: Option<usize>,
    frame_rate: Option<f32>,
    num_components: Option<usize>,
}

/// 解析 md5anim 文本为动画片段
pub fn parse_md5anim(name: &str, text: &str) -> Result<AnimationClip> {
    let mut t = Tokenizer::new(text);
    read_version(&mut t)?;

    let mut header = Header::default();
    let mut hierarchy: Option<Vec<HierarchyEntry>> = None;
    let mut bounds = Vec::new();
    let mut base: Option<Vec<RawTransform>> = None;
    let mut frames: Vec<Frame> = Vec::new();

    while let Some(token) = t.next_token()? {
        match token {
            Token::Word("commandline") => {
                t.read_string()?;
            }
            Token::Word("numFrames") => header.num_frames = Some(t.read_count()?),
            Token::Word("numJoints") => header.num_joints = Some(t.read_count()?),
            Token::Word("frameRate") => header.frame_rate = Some(t.read_float()?),
            Token::Word("numAnimatedComponents") => header.num_components = Some(t.read_count()?),
            Token::Word("hierarchy") => {
                let (joints, components) = required_counts(&t, &header)?;
                hierarchy = Some(read_hierarchy(&mut t, joints, components)?);
            }
            Token::Word("bounds") => bounds = read_bounds(&mut t)?,
            Token::Word("baseframe") => {
                let Some(entries) = hierarchy.as_ref() else {
                    return Err(t.error("'baseframe' before 'hierarchy'"));
                };
                base = Some(read_base_frame(&mut t, entries.len())?);
            }
            Token::Word("frame") => {
                let (Some(entries), Some(base)) = (hierarchy.as_ref(), base.as_ref()) else {
                    return Err(t.error("'frame' before 'hierarchy' and 'baseframe'"));
                };
                let (_, components) = required_counts(&t, &header)?;
                let index = t.read_count()?;
                if index != frames.len() {
                    return Err(t.error(format!("expected frame {}, found frame {}", frames.len(), index)));
                }
                frames.push(read_frame(&mut t, entries, base, components)?);
            }
            other => return Err(t.error(format!("unexpected {}", other))),
        }
    }

    let hierarchy = hierarchy.ok_or_else(|| Md5Error::malformed("missing 'hierarchy' block"))?;
    let base = base.ok_or_else(|| Md5Error::malformed("missing 'baseframe' block"))?;
    if let Some(expected) = header.num_frames {
        if expected != frames.len() {
            return Err(Md5Error::malformed(format!(
                "numFrames is {}, found {} frames",
                expected,
                frames.len()
            )));
        }
    }
    let frame_rate = header
        .frame_rate
        .ok_or_else(|| Md5Error::malformed("missing 'frameRate'"))?;

    let base_frame = BaseFrame::new(
        hierarchy.iter().map(|e| e.name.clone()).collect(),
        hierarchy.iter().map(|e| e.parent).collect(),
        Frame::new(base.iter().map(|raw| to_transform(*raw)).collect()),
    )?;
    let clip = AnimationClip::new(name, frame_rate, base_frame, frames, bounds)?;
    log::info!(
        "md5anim '{}' 解析完成: {} 帧, {} 个关节, {} fps",
        clip.name(),
        clip.frame_count(),
        clip.joint_count(),
        clip.frame_rate()
    );
    Ok(clip)
}

fn required_counts(t: &Tokenizer, header: &Header) -> Result<(usize, usize)> {
    match (header.num_joints, header.num_components) {
        (Some(joints), Some(components)) => Ok((joints, components)),
        _ => Err(t.error("'numJoints' and 'numAnimatedComponents' must precede animation data")),
    }
}

fn read_hierarchy(t: &mut Tokenizer, count: usize, components: usize) -> Result<Vec<HierarchyEntry>> {
    t.expect_punct('{')?;
    let mut entries = Vec::with_capacity(count);
    loop {
        if t.peek()? == Some(&Token::Punct('}')) {
            t.next_token()?;
            break;
        }
        let name = t.read_string()?.to_string();
        let parent = t.read_int()?;
        let parent = check_parent(t, entries.len(), parent)?;
        let flags = u32::try_from(t.read_int()?)
            .ok()
            .filter(|f| (f & !0x3f) == 0)
            .ok_or_else(|| t.error(format!("joint '{}' has invalid flags", name)))?;
        let start = t.read_count()?;
        let used = flags.count_ones() as usize;
        if start + used > components {
            return Err(t.error(format!(
                "joint '{}' components {}..{} exceed numAnimatedComponents {}",
                name,
                start,
                start + used,
                components
            )));
        }
        entries.push(HierarchyEntry {
            name,
            parent,
            flags,
            start,
        });
    }
    if entries.len() != count {
        return Err(t.error(format!("numJoints is {}, found {} joints", count, entries.len())));
    }
    Ok(entries)
}

fn read_bounds(t: &mut Tokenizer) -> Result<Vec<Bounds>> {
    t.expect_punct('{')?;
    let mut bounds = Vec::new();
    while t.peek()? != Some(&Token::Punct('}')) {
        let min = t.read_vec3()?;
        let max = t.read_vec3()?;
        bounds.push(Bounds::new(min, max));
    }
    t.expect_punct('}')?;
    Ok(bounds)
}

fn read_base_frame(t: &mut Tokenizer, count: usize) -> Result<Vec<RawTransform>> {
    t.expect_punct('{')?;
    let mut base = Vec::with_capacity(count);
    while t.peek()? != Some(&Token::Punct('}')) {
        let position = t.read_vec3()?;
        let orientation = t.read_vec3()?;
        base.push(RawTransform {
            position,
            orientation,
        });
    }
    t.expect_punct('}')?;
    if base.len() != count {
        return Err(t.error(format!("baseframe has {} joints, expected {}", base.len(), count)));
    }
    Ok(base)
}

fn read_frame(
    t: &mut Tokenizer,
    hierarchy: &[HierarchyEntry],
    base: &[RawTransform],
    components: usize,
) -> Result<Frame> {
    t.expect_punct('{')?;
    let mut values = Vec::with_capacity(components);
    while t.peek()? != Some(&Token::Punct('}')) {
        values.push(t.read_float()?);
    }
    t.expect_punct('}')?;
    if values.len() != components {
        return Err(t.error(format!(
            "frame has {} components, expected {}",
            values.len(),
            components
        )));
    }

    let transforms = hierarchy
        .iter()
        .zip(base)
        .map(|(entry, raw)| {
            let mut raw = *raw;
            let mut next = values[entry.start..].iter().copied();
            let mut take = |flag: u32, slot: &mut f32| {
                if entry.flags & flag != 0 {
                    if let Some(v) = next.next() {
                        *slot = v;
                    }
                }
            };
            take(TX, &mut raw.position.x);
            take(TY, &mut raw.position.y);
            take(TZ, &mut raw.position.z);
            take(QX, &mut raw.orientation.x);
            take(QY, &mut raw.orientation.y);
            take(QZ, &mut raw.orientation.z);
            to_transform(raw)
        })
        .collect();
    Ok(Frame::new(transforms))
}

fn to_transform(raw: RawTransform) -> JointTransform {
    JointTransform::new(raw.position, quat_from_xyz(raw.orientation))
}
