//! Runs every .qir program under tests/qir through the compiler.
//!
//! A file compiles successfully and must pass the hazard checks, unless it
//! carries an `; EXPECT-ERROR: <kind>` line, in which case parsing or
//! compilation must fail with that error kind.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::{check_hazards, init_logging};
use qpuc::core::{CompilationSession, CompileOptions};
use qpuc::{compile_shader, parse_qir, CompileResult, CompiledShader};

fn discover_qir_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(discover_qir_files(&path));
            } else if path.extension().and_then(|s| s.to_str()) == Some("qir") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn compile(text: &str, optimize: bool) -> CompileResult<CompiledShader> {
    let ir = parse_qir(text)?;
    let mut session = CompilationSession::new(CompileOptions::default().with_optimize(optimize));
    compile_shader(&mut session, ir)
}

fn run_qir_file(path: &Path) -> Result<(), String> {
    let text = fs::read_to_string(path).map_err(|e| format!("failed to read: {}", e))?;
    let expected_error = text
        .lines()
        .find_map(|l| l.trim().strip_prefix("; EXPECT-ERROR:"))
        .map(str::trim);

    for optimize in [true, false] {
        match (compile(&text, optimize), expected_error) {
            (Ok(shader), None) => {
                check_hazards(&shader.insts, shader.stage)?;
                let declared = parse_qir(&text).map_err(|e| e.to_string())?;
                if shader.num_texture_samples != declared.num_texture_samples {
                    return Err("texture sample count lost".into());
                }
            }
            (Ok(_), Some(kind)) => return Err(format!("expected {} error, compiled", kind)),
            (Err(e), None) => return Err(format!("unexpected error: {}", e)),
            (Err(e), Some(kind)) => {
                let actual = format!("{:?}", e.kind());
                if actual != kind {
                    return Err(format!("expected {} error, got {} ({})", kind, actual, e));
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_qir_files() {
    init_logging();
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/qir");
    let files = discover_qir_files(&dir);
    assert!(!files.is_empty(), "no .qir files under {}", dir.display());

    let failures: Vec<String> = files
        .iter()
        .filter_map(|path| {
            run_qir_file(path)
                .err()
                .map(|e| format!("{}: {}", path.display(), e))
        })
        .collect();
    assert!(failures.is_empty(), "failing fixtures:\n{}", failures.join("\n"));
}
