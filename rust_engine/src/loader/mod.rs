//! MD5 文件加载
//!
//! 加载器由调用方创建并持有，配置随实例传递。

pub(crate) mod tokenizer;

use std::fs;
use std::path::Path;

use glam::{Quat, Vec3};

use crate::animation::{parse_md5anim, AnimationClip};
use crate::model::{parse_md5mesh, Md5Model, MeshFile};
use crate::skinning::SkinningContext;
use crate::{Md5Error, Result};

use tokenizer::Tokenizer;

/// 唯一支持的格式版本
pub const MD5_VERSION: i64 = 10;

/// 加载配置
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// 顶点权重之和与 1 的允许误差
    pub weight_tolerance: f32,
    /// 权重之和超出误差时报错；为 false 时归一化并记录警告
    pub strict_weights: bool,
    /// 蒙皮后重新计算法线
    pub compute_normals: bool,
    pub skinning: SkinningContext,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            weight_tolerance: 1e-3,
            strict_weights: true,
            compute_normals: true,
            skinning: SkinningContext::default(),
        }
    }
}

/// MD5 加载器
#[derive(Clone, Debug, Default)]
pub struct Md5Loader {
    config: LoaderConfig,
}

impl Md5Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// 解析 md5mesh 文本
    pub fn load_mesh_str(&self, text: &str) -> Result<MeshFile> {
        parse_md5mesh(text, &self.config)
    }

    /// 从文件加载 md5mesh
    pub fn load_mesh<P: AsRef<Path>>(&self, path: P) -> Result<MeshFile> {
        let text = fs::read_to_string(path.as_ref())?;
        self.load_mesh_str(&text)
    }

    /// 解析 md5anim 文本
    pub fn load_anim_str(&self, name: &str, text: &str) -> Result<AnimationClip> {
        parse_md5anim(name, text)
    }

    /// 从文件加载 md5anim，动画名取文件名（不含扩展名）
    pub fn load_anim<P: AsRef<Path>>(&self, path: P) -> Result<AnimationClip> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.load_anim_str(&name, &text)
    }

    /// 由 md5mesh 文本与若干动画组装模型，第一个动画立即开始播放
    pub fn model_from_str(&self, name: &str, mesh: &str, anims: &[(&str, &str)]) -> Result<Md5Model> {
        let clips = anims
            .iter()
            .map(|(anim_name, text)| self.load_anim_str(anim_name, text))
            .collect::<Result<Vec<_>>>()?;
        build_model(name, self.load_mesh_str(mesh)?, clips)
    }

    /// 从文件加载模型，模型名取 md5mesh 文件名
    pub fn load_model<P, A>(&self, mesh_path: P, anim_paths: &[A]) -> Result<Md5Model>
    where
        P: AsRef<Path>,
        A: AsRef<Path>,
    {
        let mesh_path = mesh_path.as_ref();
        let mesh = self.load_mesh(mesh_path)?;
        let clips = anim_paths
            .iter()
            .map(|path| self.load_anim(path))
            .collect::<Result<Vec<_>>>()?;
        let name = mesh_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        build_model(&name, mesh, clips)
    }
}

fn build_model(name: &str, mesh: MeshFile, clips: Vec<AnimationClip>) -> Result<Md5Model> {
    let mut model = Md5Model::new(name, mesh.skeleton, mesh.meshes);
    for clip in clips {
        model.add_animation(clip)?;
    }
    log::info!(
        "模型 '{}' 加载完成: {} 个网格, {} 个动画",
        name,
        model.meshes().len(),
        model.controller().animations().len()
    );
    Ok(model)
}

/// 由四元数虚部恢复单位四元数，实部取非正值
pub(crate) fn quat_from_xyz(v: Vec3) -> Quat {
    let t = 1.0 - v.length_squared();
    let w = if t < 0.0 { 0.0 } else { -t.sqrt() };
    Quat::from_xyzw(v.x, v.y, v.z, w).normalize()
}

/// 读取 `MD5Version <n>`，版本不是 10 时返回 InvalidVersion
pub(crate) fn read_version(t: &mut Tokenizer) -> Result<()> {
    t.expect_word("MD5Version")?;
    let version = t.read_int()?;
    if version != MD5_VERSION {
        return Err(Md5Error::InvalidVersion {
            version: i32::try_from(version).unwrap_or(i32::MAX),
        });
    }
    Ok(())
}

/// 检查父索引：仅 0 号关节为根，其余父索引小于自身
pub(crate) fn check_parent(t: &Tokenizer, index: usize, parent: i64) -> Result<i32> {
    let valid = if index == 0 {
        parent == -1
    } else {
        parent >= 0 && (parent as usize) < index
    };
    if !valid {
        return Err(t.error(format!(
            "joint {} has parent index {}, expected {}",
            index,
            parent,
            if index == 0 { "-1".to_string() } else { format!("0..{}", index) }
        )));
    }
    Ok(parent as i32)
}
