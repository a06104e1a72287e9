//! 测试用 MD5 文本

#![allow(dead_code)]

/// 两个关节：root 位于原点，child 位于 (0, 1, 0)
pub const BODY_MESH: &str = r#"MD5Version 10
commandline "fixture body"

numJoints 2
numMeshes 1

joints {
	"root"	-1 ( 0 0 0 ) ( 0 0 0 )		//
	"child"	0 ( 0 1 0 ) ( 0 0 0 )		// root
}

mesh {
	// body
	shader "body"

	numverts 3
	vert 0 ( 0 0 ) 0 1
	vert 1 ( 1 0 ) 1 1
	vert 2 ( 0 1 ) 2 1

	numtris 1
	tri 0 0 1 2

	numweights 3
	weight 0 0 1 ( 0 0 0 )
	weight 1 1 1 ( 1 0 0 )
	weight 2 1 1 ( 0 1 0 )
}
"#;

/// 与 BODY_MESH 共享骨骼的头部网格
pub const HEAD_MESH: &str = r#"MD5Version 10
commandline "fixture head"

numJoints 2
numMeshes 1

joints {
	"root"	-1 ( 0 0 0 ) ( 0 0 0 )
	"child"	0 ( 0 1 0 ) ( 0 0 0 )
}

mesh {
	shader "head"

	numverts 1
	vert 0 ( 0.5 0.5 ) 0 1

	numtris 0

	numweights 1
	weight 0 1 1 ( 0 0.5 0 )
}
"#;

/// child 绕 Z 轴从 0° 转到 90°，1 fps
pub const BEND_ANIM: &str = r#"MD5Version 10
commandline "fixture bend"

numFrames 2
numJoints 2
frameRate 1
numAnimatedComponents 1

hierarchy {
	"root"	-1 0 0	//
	"child"	0 32 0	// root ( Qz )
}

bounds {
	( 0 0 0 ) ( 1 2 0 )
	( -1 0 0 ) ( 0 2 0 )
}

baseframe {
	( 0 0 0 ) ( 0 0 0 )
	( 0 1 0 ) ( 0 0 0 )
}

frame 0 {
	0
}

frame 1 {
	-0.7071068
}
"#;

/// root 沿 Y 轴从 0 升到 2，1 fps
pub const LIFT_ANIM: &str = r#"MD5Version 10
commandline "fixture lift"

numFrames 2
numJoints 2
frameRate 1
numAnimatedComponents 1

hierarchy {
	"root"	-1 2 0
	"child"	0 0 1
}

bounds {
	( 0 0 0 ) ( 1 2 0 )
	( 0 2 0 ) ( 1 4 0 )
}

baseframe {
	( 0 0 0 ) ( 0 0 0 )
	( 0 1 0 ) ( 0 0 0 )
}

frame 0 {
	0
}

frame 1 {
	2
}
"#;

/// 三个关节的动画，与两关节骨骼不匹配
pub const TAIL_ANIM: &str = r#"MD5Version 10
numFrames 1
numJoints 3
frameRate 24
numAnimatedComponents 0

hierarchy {
	"root"	-1 0 0
	"child"	0 0 0
	"tail"	1 0 0
}

baseframe {
	( 0 0 0 ) ( 0 0 0 )
	( 0 1 0 ) ( 0 0 0 )
	( 0 2 0 ) ( 0 0 0 )
}

frame 0 {
}
"#;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
