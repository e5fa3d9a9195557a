// Helpers for driving the harness against fake simulations
//
// A fake simulation is a shell script used as the `--runtime`. The harness
// invokes it as `<script> -cp <classpath> <entry-point> <tasks> <workers>`,
// so inside the script the counts are `$4` and `$5`.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Header the real simulation prints
pub const HEADER: &str =
    "TaskID,Priority,SubmissionTime,ExecutionStartTime,QueueWaitTime,TotalSimTimeMs,TotalTasks";

/// Write an executable `sh` script into `dir` and return its path
pub fn fake_simulation(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A script that prints `csv` verbatim and exits 0
pub fn printing_simulation(dir: &Path, csv: &str) -> PathBuf {
    fake_simulation(dir, "sim.sh", &format!("cat <<'CSV'\n{}CSV", csv))
}
