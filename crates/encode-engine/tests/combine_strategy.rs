mod common;

use std::fs::File;
use std::path::PathBuf;

use common::{drain, log_lines, touch_inputs, FakeRunner};
use tinytv_common::TinytvError;
use tinytv_encode_engine::{CombineRequest, EventSink, JobOutcome};
use tinytv_media_model::{Quality, TargetFps};

fn combine_request(files: Vec<PathBuf>, out: &std::path::Path) -> CombineRequest {
    CombineRequest {
        files,
        output_dir: Some(out.to_path_buf()),
        output_name: Some("marathon".to_string()),
        fps: TargetFps::Twelve,
        quality: Quality::new(6),
        channel: String::new(),
    }
}

fn count(args: &[String], flag: &str) -> usize {
    args.iter().filter(|a| *a == flag).count()
}

#[test]
fn combine_with_no_files_never_spawns() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, runner) = FakeRunner::new().into_engine();

    let err = engine
        .prepare_combine(combine_request(Vec::new(), dir.path()))
        .unwrap_err();

    assert!(matches!(err, TinytvError::Input { .. }));
    assert_eq!(runner.run_count(), 0);
    assert!(runner.captures().is_empty());
}

#[test]
fn single_file_is_transcoded_directly() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = touch_inputs(dir.path(), 1);
    let (engine, runner) = FakeRunner::new().into_engine();

    let job = engine
        .prepare_combine(combine_request(inputs, dir.path()))
        .unwrap();
    let report = engine.run_combine(&job, &EventSink::detached());

    assert!(report.outcome.is_success());
    let runs = runner.runs();
    assert_eq!(runs.len(), 1);
    let args = &runs[0];
    assert_eq!(count(args, "-i"), 1);
    assert_eq!(count(args, "-filter_complex"), 0);
    assert_eq!(count(args, "-safe"), 0);
    assert!(!args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat"));
    assert!(!args.iter().any(|a| a.contains("concat=")));
    assert!(args.iter().any(|a| a == "fps=12,format=yuv420p,setsar=1"));
    assert!(args.windows(2).any(|w| w[0] == "-q:v" && w[1] == "6"));
}

#[test]
fn forty_nine_files_use_one_filter_graph() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = touch_inputs(dir.path(), 49);
    let (engine, runner) = FakeRunner::new().into_engine();

    let job = engine
        .prepare_combine(combine_request(inputs, dir.path()))
        .unwrap();
    let report = engine.run_combine(&job, &EventSink::detached());

    assert!(report.outcome.is_success());
    let runs = runner.runs();
    assert_eq!(runs.len(), 1);
    let args = &runs[0];
    assert_eq!(count(args, "-i"), 49);
    assert_eq!(count(args, "-filter_complex"), 1);
    let graph = args
        .iter()
        .find(|a| a.contains("concat=n="))
        .expect("filter graph present");
    assert!(graph.ends_with("concat=n=49:v=1:a=1[v][a]"));
    assert!(graph.starts_with("[0:v:0]fps=12,format=yuv420p,setsar=1[v0];"));
    assert!(runner.concat_lists().is_empty());
}

#[test]
fn fifty_files_switch_to_a_list_file() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = touch_inputs(dir.path(), 50);
    let (engine, runner) = FakeRunner::new().into_engine();

    let job = engine
        .prepare_combine(combine_request(inputs.clone(), dir.path()))
        .unwrap();
    let report = engine.run_combine(&job, &EventSink::detached());

    assert!(report.outcome.is_success());
    let runs = runner.runs();
    assert_eq!(runs.len(), 1);
    let args = &runs[0];
    assert_eq!(count(args, "-i"), 1);
    assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat"));
    assert!(args.windows(2).any(|w| w[0] == "-fflags" && w[1] == "+genpts"));

    let lists = runner.concat_lists();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].lines().count(), 50);
    assert!(lists[0].starts_with("file '"));

    let list_path = args
        .windows(2)
        .find(|w| w[0] == "-i")
        .map(|w| PathBuf::from(&w[1]))
        .unwrap();
    assert!(!list_path.exists(), "list file should be cleaned up");
}

#[test]
fn hundred_files_still_spawn_once() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = touch_inputs(dir.path(), 100);
    let (engine, runner) = FakeRunner::new().into_engine();

    let job = engine
        .prepare_combine(combine_request(inputs, dir.path()))
        .unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let report = engine.run_combine(&job, &EventSink::new(tx));

    assert!(report.outcome.is_success());
    assert_eq!(runner.run_count(), 1);
    assert_eq!(runner.concat_lists()[0].lines().count(), 100);

    let lines = log_lines(&drain(&mut rx));
    assert!(lines.iter().any(|l| l.starts_with("[*] Using concat list (100 files)")));
    assert_eq!(lines.last().map(String::as_str), Some("[OK] Combine complete."));
}

#[test]
fn list_file_is_removed_when_the_encode_fails() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = touch_inputs(dir.path(), 60);
    let (engine, runner) = FakeRunner::new().failing_run(1).into_engine();

    let job = engine
        .prepare_combine(combine_request(inputs, dir.path()))
        .unwrap();
    let report = engine.run_combine(&job, &EventSink::detached());

    assert!(matches!(report.outcome, JobOutcome::Failed { .. }));
    let args = &runner.runs()[0];
    let list_path = args
        .windows(2)
        .find(|w| w[0] == "-i")
        .map(|w| PathBuf::from(&w[1]))
        .unwrap();
    assert!(!list_path.exists());
}

#[test]
fn combine_without_output_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = touch_inputs(dir.path(), 3);
    let (engine, _runner) = FakeRunner::new().without_output().into_engine();

    let job = engine
        .prepare_combine(combine_request(inputs, dir.path()))
        .unwrap();
    let report = engine.run_combine(&job, &EventSink::detached());

    match report.outcome {
        JobOutcome::Failed { item, reason } => {
            assert_eq!(item, "marathon.avi");
            assert!(reason.contains("no output"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn oversized_combine_is_refused_before_any_encode() {
    let dir = tempfile::tempdir().unwrap();
    let inputs: Vec<PathBuf> = (0..4)
        .map(|i| {
            let path = dir.path().join(format!("big_{i}.mp4"));
            File::create(&path).unwrap().set_len(1_200_000_000).unwrap();
            path
        })
        .collect();
    let (engine, runner) = FakeRunner::new().into_engine();

    let err = engine
        .prepare_combine(combine_request(inputs, dir.path()))
        .unwrap_err();

    assert!(matches!(err, TinytvError::Precondition { .. }));
    assert!(err.to_string().contains("FAT32"));
    assert_eq!(runner.run_count(), 0);
    assert!(!dir.path().join("marathon.avi").exists());
}

#[test]
fn higher_source_rate_shrinks_the_estimate() {
    // 4 x 1.2 GB at 24 fps going to 12 fps halves to 2.4 GB, under the limit.
    let dir = tempfile::tempdir().unwrap();
    let inputs: Vec<PathBuf> = (0..4)
        .map(|i| {
            let path = dir.path().join(format!("big_{i}.mp4"));
            File::create(&path).unwrap().set_len(1_200_000_000).unwrap();
            path
        })
        .collect();
    let (engine, runner) = FakeRunner::new().with_frame_rate("24/1").into_engine();

    let job = engine
        .prepare_combine(combine_request(inputs, dir.path()))
        .unwrap();

    assert_eq!(job.total(), 4);
    assert_eq!(runner.run_count(), 0);
    assert_eq!(runner.captures().len(), 4);
}
