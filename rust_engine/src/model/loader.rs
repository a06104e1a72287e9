//! md5mesh 解析

use glam::Vec2;

use crate::loader::tokenizer::{Token, Tokenizer};
use crate::loader::{check_parent, quat_from_xyz, read_version, LoaderConfig};
use crate::skeleton::{Joint, JointTransform, Skeleton};
use crate::{Md5Error, Result};

use super::{Mesh, Vertex, Weight};

/// md5mesh 解析结果
#[derive(Clone, Debug)]
pub struct MeshFile {
    pub command_line: String,
    pub skeleton: Skeleton,
    pub meshes: Vec<Mesh>,
}

/// 文件中的关节：模型空间变换
struct RawJoint {
    name: String,
    parent: i32,
    world: JointTransform,
}

/// 解析 md5mesh 文本
///
/// 任何结构错误都会中止解析，不返回部分结果。
pub fn parse_md5mesh(text: &str, config: &LoaderConfig) -> Result<MeshFile> {
    let mut t = Tokenizer::new(text);
    read_version(&mut t)?;

    let mut command_line = String::new();
    let mut num_joints = None;
    let mut num_meshes = None;
    let mut raw_joints: Option<Vec<RawJoint>> = None;
    let mut meshes = Vec::new();

    while let Some(token) = t.next_token()? {
        match token {
            Token::Word("commandline") => command_line = t.read_string()?.to_string(),
            Token::Word("numJoints") => num_joints = Some(t.read_count()?),
            Token::Word("numMeshes") => num_meshes = Some(t.read_count()?),
            Token::Word("joints") => {
                let Some(count) = num_joints else {
                    return Err(t.error("'joints' block before 'numJoints'"));
                };
                raw_joints = Some(read_joints(&mut t, count)?);
            }
            Token::Word("mesh") => {
                let Some(joints) = raw_joints.as_ref() else {
                    return Err(t.error("'mesh' block before 'joints'"));
                };
                meshes.push(read_mesh(&mut t, joints.len(), config)?);
            }
            other => return Err(t.error(format!("unexpected {}", other))),
        }
    }

    let raw_joints = raw_joints.ok_or_else(|| Md5Error::malformed("missing 'joints' block"))?;
    if let Some(expected) = num_meshes {
        if expected != meshes.len() {
            return Err(Md5Error::malformed(format!(
                "numMeshes is {}, found {} mesh blocks",
                expected,
                meshes.len()
            )));
        }
    }

    let skeleton = build_skeleton(&raw_joints)?;
    // 绑定姿势下的蒙皮结果
    for mesh in &meshes {
        mesh.update_mesh(&skeleton);
        mesh.swap_buffer();
    }
    log::info!(
        "md5mesh 解析完成: {} 个关节, {} 个网格",
        skeleton.joint_count(),
        meshes.len()
    );

    Ok(MeshFile {
        command_line,
        skeleton,
        meshes,
    })
}

fn read_joints(t: &mut Tokenizer, count: usize) -> Result<Vec<RawJoint>> {
    t.expect_punct('{')?;
    let mut joints = Vec::with_capacity(count);
    loop {
        if t.peek()? == Some(&Token::Punct('}')) {
            t.next_token()?;
            break;
        }
        let name = t.read_string()?.to_string();
        let parent = t.read_int()?;
        let parent = check_parent(t, joints.len(), parent)?;
        let position = t.read_vec3()?;
        let orientation = quat_from_xyz(t.read_vec3()?);
        joints.push(RawJoint {
            name,
            parent,
            world: JointTransform::new(position, orientation),
        });
    }
    if joints.len() != count {
        return Err(t.error(format!("numJoints is {}, found {} joints", count, joints.len())));
    }
    Ok(joints)
}

/// 模型空间变换转换为相对父关节的绑定变换
fn build_skeleton(raw: &[RawJoint]) -> Result<Skeleton> {
    let joints = raw
        .iter()
        .map(|joint| {
            let local = match usize::try_from(joint.parent).ok().and_then(|p| raw.get(p)) {
                Some(parent) => parent.world.inverse().compose(&joint.world),
                None => joint.world,
            };
            Joint::new(joint.name.clone(), joint.parent, local)
        })
        .collect();
    Skeleton::new(joints)
}

fn read_mesh(t: &mut Tokenizer, joint_count: usize, config: &LoaderConfig) -> Result<Mesh> {
    t.expect_punct('{')?;
    let mut shader = String::new();
    let mut vertices: Option<Vec<Vertex>> = None;
    let mut triangles: Option<Vec<[u32; 3]>> = None;
    let mut weights: Option<Vec<Weight>> = None;

    loop {
        match t.next_token()? {
            Some(Token::Punct('}')) => break,
            Some(Token::Word("shader")) => shader = t.read_string()?.to_string(),
            Some(Token::Word("numverts")) => {
                let count = t.read_count()?;
                let mut list = Vec::with_capacity(count);
                for i in 0..count {
                    t.expect_word("vert")?;
                    expect_index(t, i)?;
                    t.expect_punct('(')?;
                    let uv = Vec2::new(t.read_float()?, t.read_float()?);
                    t.expect_punct(')')?;
                    let weight_start = t.read_count()?;
                    let weight_count = t.read_count()?;
                    list.push(Vertex {
                        uv,
                        weight_start,
                        weight_count,
                    });
                }
                vertices = Some(list);
            }
            Some(Token::Word("numtris")) => {
                let count = t.read_count()?;
                let mut list = Vec::with_capacity(count);
                for i in 0..count {
                    t.expect_word("tri")?;
                    expect_index(t, i)?;
                    let mut tri = [0u32; 3];
                    for slot in &mut tri {
                        *slot = u32::try_from(t.read_count()?)
                            .map_err(|_| t.error("triangle index too large"))?;
                    }
                    list.push(tri);
                }
                triangles = Some(list);
            }
            Some(Token::Word("numweights")) => {
                let count = t.read_count()?;
                let mut list = Vec::with_capacity(count);
                for i in 0..count {
                    t.expect_word("weight")?;
                    expect_index(t, i)?;
                    let joint_index = t.read_count()?;
                    if joint_index >= joint_count {
                        return Err(t.error(format!(
                            "weight {} references joint {}, skeleton has {}",
                            i, joint_index, joint_count
                        )));
                    }
                    let bias = t.read_float()?;
                    if bias <= 0.0 || bias > 1.0 {
                        return Err(t.error(format!(
                            "weight {} has bias {}, expected a value in (0, 1]",
                            i, bias
                        )));
                    }
                    let offset = t.read_vec3()?;
                    list.push(Weight {
                        joint_index,
                        bias,
                        offset,
                    });
                }
                weights = Some(list);
            }
            Some(other) => return Err(t.error(format!("unexpected {} in mesh block", other))),
            None => return Err(t.error("unterminated mesh block")),
        }
    }

    let vertices = vertices.unwrap_or_default();
    let triangles = triangles.unwrap_or_default();
    let mut weights = weights.unwrap_or_default();
    validate_mesh(t, &shader, &vertices, &triangles, &mut weights, config)?;

    Ok(Mesh::new(shader, vertices, triangles, weights)
        .with_normals(config.compute_normals)
        .with_skinning_context(config.skinning.clone()))
}

fn expect_index(t: &mut Tokenizer, expected: usize) -> Result<()> {
    let index = t.read_count()?;
    if index != expected {
        return Err(t.error(format!("expected index {}, found {}", expected, index)));
    }
    Ok(())
}

/// 检查权重区间、三角形索引与权重之和
fn validate_mesh(
    t: &Tokenizer,
    shader: &str,
    vertices: &[Vertex],
    triangles: &[[u32; 3]],
    weights: &mut [Weight],
    config: &LoaderConfig,
) -> Result<()> {
    if let Some(tri) = triangles
        .iter()
        .find(|tri| tri.iter().any(|&i| i as usize >= vertices.len()))
    {
        return Err(t.error(format!(
            "mesh '{}': triangle {:?} out of range ({} vertices)",
            shader,
            tri,
            vertices.len()
        )));
    }

    for (i, vertex) in vertices.iter().enumerate() {
        let end = vertex.weight_start.saturating_add(vertex.weight_count);
        let Some(range) = weights.get_mut(vertex.weight_start..end) else {
            return Err(t.error(format!(
                "mesh '{}': vertex {} weights {}..{} out of range ({} weights)",
                shader,
                i,
                vertex.weight_start,
                end,
                weights.len()
            )));
        };

        let sum: f32 = range.iter().map(|w| w.bias).sum();
        if (sum - 1.0).abs() <= config.weight_tolerance {
            continue;
        }
        if config.strict_weights || sum <= 0.0 {
            return Err(t.error(format!(
                "mesh '{}': vertex {} weight bias sum is {}",
                shader, i, sum
            )));
        }
        log::warn!("网格 '{}' 顶点 {} 权重之和为 {}，已归一化", shader, i, sum);
        for weight in range {
            weight.bias /= sum;
        }
    }
    Ok(())
}
