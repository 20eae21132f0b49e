use std::path::PathBuf;

use datalens_batch::{Image, LabelMask, RawBatch};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution as _, Normal};
use rand_pcg::Pcg64;

use crate::util::Output;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GenerateDatasetArg {
    /// Number of batches to generate
    #[arg(long, default_value_t = 10)]
    num_batches: usize,
    /// Samples per batch
    #[arg(long, default_value_t = 8)]
    batch_size: usize,
    /// Image height in pixels
    #[arg(long, default_value_t = 64)]
    height: usize,
    /// Image width in pixels
    #[arg(long, default_value_t = 64)]
    width: usize,
    /// Number of classes, including the background class 0
    #[arg(long, default_value_t = 3)]
    number_of_classes: u8,
    /// Maximum number of objects drawn per image
    #[arg(long, default_value_t = 4)]
    max_objects: usize,
    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Default for GenerateDatasetArg {
    fn default() -> Self {
        Self {
            num_batches: 10,
            batch_size: 8,
            height: 64,
            width: 64,
            number_of_classes: 3,
            max_objects: 4,
            seed: None,
            output: None,
        }
    }
}

/// Draws filled rectangles of random classes on a background of class 0.
#[derive(Debug)]
struct SampleGenerator {
    height: usize,
    width: usize,
    number_of_classes: u8,
    max_objects: usize,
    background: Normal<f32>,
    object: Normal<f32>,
}

impl SampleGenerator {
    fn new(arg: &GenerateDatasetArg) -> anyhow::Result<Self> {
        anyhow::ensure!(
            arg.height > 0 && arg.width > 0,
            "image size must be positive"
        );
        anyhow::ensure!(
            arg.number_of_classes >= 1,
            "at least the background class is required"
        );
        Ok(Self {
            height: arg.height,
            width: arg.width,
            number_of_classes: arg.number_of_classes,
            max_objects: arg.max_objects,
            background: Normal::new(60.0, 20.0)?,
            object: Normal::new(170.0, 30.0)?,
        })
    }

    fn sample<R>(&self, rng: &mut R) -> (Image, LabelMask)
    where
        R: Rng,
    {
        let mut label = LabelMask::filled(self.height, self.width, 0);
        if self.number_of_classes > 1 {
            for _ in 0..rng.random_range(0..=self.max_objects) {
                let class_id = rng.random_range(1..self.number_of_classes);
                let h = rng.random_range(1..=self.height.div_ceil(3));
                let w = rng.random_range(1..=self.width.div_ceil(3));
                let y0 = rng.random_range(0..=self.height - h);
                let x0 = rng.random_range(0..=self.width - w);
                for y in y0..y0 + h {
                    let row = y * self.width;
                    label.values[row + x0..row + x0 + w].fill(class_id);
                }
            }
        }

        let pixels = label
            .values
            .iter()
            .map(|&class_id| {
                let dist = if class_id == 0 {
                    &self.background
                } else {
                    &self.object
                };
                dist.sample(rng).clamp(0.0, 255.0)
            })
            .collect();
        let image = Image {
            channels: 1,
            height: self.height,
            width: self.width,
            pixels,
        };
        (image, label)
    }

    fn batch<R>(&self, rng: &mut R, batch_size: usize) -> RawBatch
    where
        R: Rng,
    {
        let (images, labels) = (0..batch_size).map(|_| self.sample(rng)).unzip();
        RawBatch { images, labels }
    }
}

pub(crate) fn run(arg: &GenerateDatasetArg) -> anyhow::Result<()> {
    let generator = SampleGenerator::new(arg)?;
    let mut rng = match arg.seed {
        Some(seed) => Pcg64::seed_from_u64(seed),
        None => Pcg64::from_rng(&mut rand::rng()),
    };

    let mut output = Output::from_output_path(arg.output.clone())?;
    for _ in 0..arg.num_batches {
        output.write_json_line(&generator.batch(&mut rng, arg.batch_size))?;
    }
    eprintln!(
        "Wrote {} batches of {} samples to {}",
        arg.num_batches,
        arg.batch_size,
        output.display_path()
    );
    output.finish()
}
