use std::path::PathBuf;

use anyhow::Context;
use datalens_analysis::{
    config::{AnalysisConfig, DispatchMode},
    manager::AnalysisManager,
};
use datalens_plot::sink::JsonDirSink;

use crate::util;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct AnalyzeArg {
    /// Analysis configuration (JSON)
    #[arg(long)]
    config: PathBuf,
    /// Train batches (JSON Lines of raw batches)
    #[arg(long)]
    train: PathBuf,
    /// Validation batches (JSON Lines of raw batches)
    #[arg(long)]
    val: Option<PathBuf>,
    /// Directory receiving one JSON document per figure
    #[arg(long, default_value = "figures")]
    output_dir: PathBuf,
    /// Run extractors one after another instead of on the worker pool
    #[arg(long)]
    sequential: bool,
    /// Worker pool size
    #[arg(long)]
    threads: Option<usize>,
    /// Show a batch counter while executing
    #[arg(long)]
    progress: bool,
}

impl AnalyzeArg {
    fn apply_overrides(&self, config: &mut AnalysisConfig) {
        if self.sequential {
            config.dispatch = DispatchMode::Sequential;
        }
        if let Some(threads) = self.threads {
            config.num_threads = Some(threads);
        }
        if self.progress {
            config.show_progress = true;
        }
    }
}

pub(crate) fn run(arg: &AnalyzeArg) -> anyhow::Result<()> {
    let mut config: AnalysisConfig = util::read_json_file("analysis config", &arg.config)?;
    arg.apply_overrides(&mut config);

    let train = util::open_batch_file(&arg.train)?;
    let val = arg.val.as_ref().map(util::open_batch_file).transpose()?;
    let sink = JsonDirSink::create(&arg.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            arg.output_dir.display()
        )
    })?;

    tracing::info!(
        config = %arg.config.display(),
        train = %arg.train.display(),
        val = ?arg.val,
        output_dir = %arg.output_dir.display(),
        "starting analysis"
    );
    let mut manager = AnalysisManager::new(config, Box::new(sink), train, val)
        .context("Failed to set up analysis")?;
    manager.run().context("Analysis failed")?;

    eprintln!(
        "Analyzed {} train / {} val batches, figures written to {}",
        manager.train_batches(),
        manager.val_batches(),
        arg.output_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use datalens_batch::{Image, LabelMask, RawBatch};

    use super::*;
    use crate::util::Output;

    fn write_batches(path: PathBuf, n: usize) {
        let mut output = Output::open(path).unwrap();
        for _ in 0..n {
            output
                .write_json_line(&RawBatch {
                    images: vec![Image::filled(1, 4, 4, 128.0)],
                    labels: vec![LabelMask::from_rows(&[
                        vec![0, 0, 0, 0],
                        vec![0, 1, 1, 0],
                        vec![0, 1, 1, 0],
                        vec![0, 0, 0, 0],
                    ])],
                })
                .unwrap();
        }
        output.finish().unwrap();
    }

    #[test]
    fn test_analyze_writes_figures() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        fs::write(
            &config,
            r#"{
                "task": "semantic_segmentation",
                "number_of_classes": 2,
                "common": ["images_average_brightness"],
                "semantic_segmentation": ["count_small_objects", "objects_center_of_mass"]
            }"#,
        )
        .unwrap();
        write_batches(dir.path().join("train.jsonl"), 3);
        write_batches(dir.path().join("val.jsonl"), 2);

        let arg = AnalyzeArg {
            config,
            train: dir.path().join("train.jsonl"),
            val: Some(dir.path().join("val.jsonl")),
            output_dir: dir.path().join("figures"),
            sequential: true,
            threads: None,
            progress: false,
        };
        run(&arg).unwrap();

        for name in [
            "ImagesAverageBrightness",
            "CountSmallObjects",
            "ObjectsCenterOfMass",
        ] {
            assert!(dir.path().join("figures").join(name).join("fig.json").is_file());
        }
        assert!(dir.path().join("figures/index.json").is_file());
    }

    #[test]
    fn test_overrides() {
        let mut config = AnalysisConfig::segmentation(2);
        let arg = AnalyzeArg {
            sequential: true,
            threads: Some(3),
            ..AnalyzeArg::default()
        };
        arg.apply_overrides(&mut config);
        assert_eq!(config.dispatch, DispatchMode::Sequential);
        assert_eq!(config.num_threads, Some(3));
        assert!(!config.show_progress);
    }
}
