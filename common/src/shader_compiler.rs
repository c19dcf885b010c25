use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;
use std::{env, fs};

const SHADER_EXTENSIONS: [&str; 4] = ["vert", "frag", "geom", "comp"];

#[derive(serde::Serialize, serde::Deserialize)]
struct TSMetaData {
    modified: SystemTime,
}

fn read_timestamps(path: &Path) -> HashMap<String, TSMetaData> {
    fs::File::open(path)
        .ok()
        .and_then(|f| serde_yaml::from_reader(f).ok())
        .unwrap_or_default()
}

fn compile_one(src: &Path, dst: &Path) -> io::Result<bool> {
    let mut cmd = Command::new("glslangValidator");
    cmd.arg("--target-env")
        .arg("vulkan1.1")
        .arg("-o")
        .arg(dst)
        .arg("-V")
        .arg(src);

    if cfg!(debug_assertions) {
        cmd.arg("-g").arg("-Od");
    }

    let output = cmd.output()?;
    if !output.status.success() {
        println!("cargo:warning={}", String::from_utf8_lossy(&output.stdout).trim());
    }
    Ok(output.status.success())
}

/// Compiles every GLSL stage under `src_dir` into `<dst_dir>/<relative path>.spv`.
///
/// Meant to be called from a build script. Sources whose modification time has not changed
/// since the last run are skipped. A missing `glslangValidator` is reported as a cargo warning
/// instead of failing the build; the renderer reports the missing binaries at startup.
pub fn compile_shaders<P: AsRef<Path>>(src_dir: P, dst_dir: P) {
    let src_dir = src_dir.as_ref();
    let dst_dir = dst_dir.as_ref();

    let ts_path: PathBuf = match env::var("OUT_DIR") {
        Ok(out_dir) => Path::new(&out_dir).join("shader_timestamps"),
        Err(_) => dst_dir.join(".shader_timestamps"),
    };
    let mut timestamps = read_timestamps(&ts_path);

    let pattern = format!("{}/**/*", src_dir.display());
    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            println!("cargo:warning=invalid shader source pattern: {}", e);
            return;
        }
    };

    for entry in entries.flatten() {
        let ext = entry.extension().and_then(|v| v.to_str()).unwrap_or("");
        if entry.is_dir() || !SHADER_EXTENSIONS.contains(&ext) {
            continue;
        }
        println!("cargo:rerun-if-changed={}", entry.display());

        let Ok(stripped) = entry.strip_prefix(src_dir) else {
            continue;
        };
        let dst_path = dst_dir.join(format!("{}.spv", stripped.display()));

        let Ok(modified) = fs::metadata(&entry).and_then(|m| m.modified()) else {
            continue;
        };
        let key = entry.display().to_string();
        let changed = timestamps.get(&key).map_or(true, |ts| modified > ts.modified);

        if !changed && dst_path.exists() {
            continue;
        }
        if let Some(parent) = dst_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        match compile_one(&entry, &dst_path) {
            Ok(true) => {
                timestamps.insert(key, TSMetaData { modified });
            }
            Ok(false) => println!("cargo:warning=failed to compile shader {}", entry.display()),
            Err(e) => {
                println!("cargo:warning=glslangValidator unavailable ({}), shaders not compiled", e);
                break;
            }
        }
    }

    if let Ok(data) = serde_yaml::to_string(&timestamps) {
        let _ = fs::write(&ts_path, data);
    }
}
