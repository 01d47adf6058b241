// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-based AutoVC training using Burn's DataLoader and Adam.
//
// Per step:
//   1. next full batch (new shuffled pass on exhaustion)
//   2. forward → org / pst / content losses
//   3. backward on the combined loss, Adam update
//   4. every save_steps: model + optimizer checkpoint
//   5. every log_steps:  scalars to metrics.csv
//
// Step numbers in file names and logs are 1-based: the
// checkpoint written after the 10 000th update is model-10000.
//
// With --num-workers n, burn splits the dataset into n fixed
// contiguous slices of len / n samples (the last one takes the
// remainder) and each worker shuffles and batches only inside
// its slice. Every slice must hold at least one full batch.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Context, Result};
use std::{sync::Arc, time::Instant};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{MelBatch, MelBatcher},
    dataset::SpeakerDataset,
    stream::BatchStream,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::{MetricsLogger, StepMetrics}};
use crate::ml::model::{AutoVc, AutoVcConfig};

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// What a finished run reports back.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// 1-based number of the last completed step
    pub last_step:   usize,
    /// Losses of the last completed step, if any step ran
    pub last:        Option<StepMetrics>,
    /// Passes over the dataset started during this run
    pub data_passes: usize,
}

/// Fail when some loader worker's slice of the dataset cannot
/// fill a single batch of `batch_size`.
pub fn check_worker_slices(samples: usize, batch_size: usize, num_workers: usize) -> Result<()> {
    if num_workers == 0 {
        return Ok(());
    }
    let smallest = samples / num_workers;
    ensure!(
        smallest >= batch_size,
        "{} speakers over {} loader workers leaves {} per worker, \
         fewer than the batch size {}; lower --num-workers",
        samples,
        num_workers,
        smallest,
        batch_size
    );
    Ok(())
}

/// Shuffling loader over `dataset`, multi-threaded when
/// `cfg.num_workers > 0`.
pub fn build_loader<B: Backend>(
    cfg:     &TrainConfig,
    dataset: SpeakerDataset,
    device:  B::Device,
) -> Result<Arc<dyn DataLoader<MelBatch<B>>>> {
    check_worker_slices(dataset.len(), cfg.batch_size, cfg.num_workers)?;

    let mut builder = DataLoaderBuilder::new(MelBatcher::<B>::new(device))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed);
    if cfg.num_workers > 0 {
        builder = builder.num_workers(cfg.num_workers);
    }
    if cfg.num_workers > 1 {
        tracing::warn!(
            "{} loader workers: speakers are shuffled within each worker's slice of {}",
            cfg.num_workers,
            dataset.len() / cfg.num_workers
        );
    }
    Ok(builder.build(dataset))
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:       &TrainConfig,
    model_cfg: &AutoVcConfig,
    dataset:   SpeakerDataset,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
    device:    B::Device,
) -> Result<TrainOutcome> {
    B::seed(cfg.seed);

    // ── Build model + Adam ────────────────────────────────────────────────────
    let mut model: AutoVc<B> = model_cfg.init(&device);
    let mut optim = AdamConfig::new().init::<B, AutoVc<B>>();

    let start = match cfg.resume_step {
        Some(step) => {
            model = ckpt.load_model(model, step, &device)?;
            optim = ckpt.load_optimizer(optim, step, &device)?;
            let stale = metrics.truncate_after(step)?;
            if stale > 0 {
                tracing::info!("Dropped {} metrics rows logged after step {}", stale, step);
            }
            tracing::info!("Resumed from checkpoint at step {}", step);
            step
        }
        None => 0,
    };
    tracing::info!(
        "Model ready: {} parameters, dim_neck={}, freq={}",
        model.num_params(),
        model_cfg.dim_neck,
        model_cfg.freq
    );

    // ── Data loader ───────────────────────────────────────────────────────────
    let loader = build_loader::<B>(cfg, dataset, device)?;
    let mut batches = BatchStream::new(|| loader.iter(), cfg.batch_size);

    // ── Step loop ─────────────────────────────────────────────────────────────
    let mut last = None;
    let started = Instant::now();

    for step in start..cfg.n_steps {
        let step_no = step + 1;
        let batch = batches
            .next_batch()
            .with_context(|| format!("No training batch available at step {step_no}"))?;

        let losses = model.forward_loss(batch.mels, batch.embs, cfg.lambda_cnt);
        let values = StepMetrics::new(
            step_no,
            losses.org.clone().into_scalar().elem::<f64>(),
            losses.pst.clone().into_scalar().elem::<f64>(),
            losses.content.clone().into_scalar().elem::<f64>(),
        );

        let grads = losses.total.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(cfg.lr, model, grads);

        tracing::debug!(
            "step {:>8} | org_rec={:.4} | pst_rec={:.4} | cnt={:.4}",
            step_no, values.org_rec, values.pst_rec, values.content
        );

        if step_no % cfg.save_steps == 0 {
            ckpt.save(&model, &optim, step_no)?;
            tracing::info!("Checkpoint saved at step {}", step_no);
        }

        if step_no % cfg.log_steps == 0 {
            metrics.log(&values)?;
            let done = (step_no - start) as f64;
            tracing::info!(
                "step {}/{} | org_rec={:.4} | pst_rec={:.4} | cnt={:.4} | {:.2} steps/s",
                step_no,
                cfg.n_steps,
                values.org_rec,
                values.pst_rec,
                values.content,
                done / started.elapsed().as_secs_f64().max(f64::EPSILON),
            );
        }

        last = Some(values);
    }

    tracing::info!("Training complete!");
    Ok(TrainOutcome {
        last_step:   cfg.n_steps.max(start),
        last,
        data_passes: batches.passes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::npy::write_f32;
    use crate::data::loader::{SpeakerLoader, EMBEDDING_FILE};
    use crate::domain::{
        speaker::{Speaker, Utterance},
        traits::SpeakerSource,
    };
    use crate::ml::model::tests::tiny_config;
    use burn::backend::{Autodiff, NdArray};
    use std::{fs, path::Path};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn write_corpus(root: &Path, speakers: usize) {
        for s in 0..speakers {
            let dir = root.join(format!("spk{s}"));
            fs::create_dir_all(&dir).unwrap();
            write_f32(&dir.join(EMBEDDING_FILE), &[3], &[s as f32, 0.5, -0.5]).unwrap();
            let values: Vec<f32> = (0..20 * 5).map(|v| (v as f32 * 0.01).sin()).collect();
            write_f32(&dir.join("utt0.npy"), &[20, 5], &values).unwrap();
        }
    }

    fn config(data: &Path, save: &Path) -> TrainConfig {
        TrainConfig {
            config_path: save.join("unused.yaml"),
            data_dir:    data.to_path_buf(),
            save_dir:    save.to_path_buf(),
            n_steps:     4,
            save_steps:  2,
            log_steps:   1,
            batch_size:  2,
            seg_len:     8,
            ..TrainConfig::default()
        }
    }

    fn try_run(cfg: &TrainConfig) -> Result<TrainOutcome> {
        let speakers = SpeakerLoader::new(&cfg.data_dir).load_all()?;
        let dataset = SpeakerDataset::new(speakers, cfg.seg_len);
        let ckpt = CheckpointManager::new(&cfg.save_dir)?;
        let metrics = MetricsLogger::new(&cfg.save_dir)?;
        train_loop::<TestBackend>(cfg, &tiny_config(), dataset, &ckpt, &metrics, Default::default())
    }

    fn run(cfg: &TrainConfig) -> TrainOutcome {
        try_run(cfg).unwrap()
    }

    fn logged_steps(save: &Path) -> Vec<usize> {
        fs::read_to_string(save.join("metrics.csv"))
            .unwrap()
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_short_run_writes_checkpoints_and_metrics() {
        let data = tempfile::tempdir().unwrap();
        let save = tempfile::tempdir().unwrap();
        write_corpus(data.path(), 3);

        let cfg = config(data.path(), save.path());
        let outcome = run(&cfg);

        assert_eq!(outcome.last_step, 4);
        let last = outcome.last.unwrap();
        assert_eq!(last.step, 4);
        assert!(last.org_rec.is_finite() && last.pst_rec.is_finite() && last.content.is_finite());

        for step in [2, 4] {
            assert!(save.path().join(format!("model-{step}.mpk.gz")).exists());
            assert!(save.path().join(format!("optimizer-{step}.mpk.gz")).exists());
        }
        assert!(!save.path().join("model-1.mpk.gz").exists());

        let ckpt = CheckpointManager::open(save.path()).unwrap();
        assert_eq!(ckpt.latest_step().unwrap(), 4);

        let csv = fs::read_to_string(save.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1 + 4);
    }

    #[test]
    fn test_small_dataset_is_refilled() {
        let data = tempfile::tempdir().unwrap();
        let save = tempfile::tempdir().unwrap();
        // 2 speakers, batch 2 → exactly one batch per pass
        write_corpus(data.path(), 2);

        let cfg = config(data.path(), save.path());
        let outcome = run(&cfg);
        assert_eq!(outcome.data_passes, 4);
    }

    #[test]
    fn test_resume_continues_from_saved_step() {
        let data = tempfile::tempdir().unwrap();
        let save = tempfile::tempdir().unwrap();
        write_corpus(data.path(), 2);

        let cfg = config(data.path(), save.path());
        run(&cfg);

        let resumed = TrainConfig { n_steps: 6, resume_step: Some(4), ..cfg };
        let outcome = run(&resumed);

        assert_eq!(outcome.last.unwrap().step, 6);
        assert!(save.path().join("model-6.mpk.gz").exists());
        let csv = fs::read_to_string(save.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1 + 6);
    }

    #[test]
    fn test_resume_from_earlier_step_rewrites_metrics_tail() {
        let data = tempfile::tempdir().unwrap();
        let save = tempfile::tempdir().unwrap();
        write_corpus(data.path(), 2);

        let cfg = config(data.path(), save.path());
        run(&cfg);
        assert_eq!(logged_steps(save.path()), vec![1, 2, 3, 4]);

        let resumed = TrainConfig { resume_step: Some(2), ..cfg };
        run(&resumed);
        assert_eq!(logged_steps(save.path()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_worker_slices_must_fill_a_batch() {
        assert!(check_worker_slices(2, 2, 0).is_ok());
        assert!(check_worker_slices(2, 2, 1).is_ok());
        assert!(check_worker_slices(2, 2, 2).is_err());
        // slices of 1 and 2
        assert!(check_worker_slices(3, 2, 2).is_err());
        assert!(check_worker_slices(4, 2, 2).is_ok());
        assert!(check_worker_slices(5, 2, 2).is_ok());
    }

    #[test]
    fn test_too_many_workers_rejected_before_training() {
        let data = tempfile::tempdir().unwrap();
        let save = tempfile::tempdir().unwrap();
        write_corpus(data.path(), 2);

        let cfg = TrainConfig { num_workers: 2, ..config(data.path(), save.path()) };
        let err = try_run(&cfg).unwrap_err();
        assert!(err.to_string().contains("loader workers"));
        assert!(!save.path().join("model-2.mpk.gz").exists());
    }

    #[test]
    fn test_multi_worker_pass_covers_every_speaker() {
        let speakers: Vec<Speaker> = (0..4)
            .map(|s| {
                Speaker::new(
                    format!("spk{s}"),
                    vec![s as f32, 0.5, -0.5],
                    vec![Utterance::new(format!("spk{s}/utt0.npy"), 5, vec![0.1; 20 * 5])],
                )
            })
            .collect();
        let cfg = TrainConfig { num_workers: 2, batch_size: 2, seg_len: 8, ..TrainConfig::default() };
        let loader =
            build_loader::<NdArray<f32>>(&cfg, SpeakerDataset::new(speakers, 8), Default::default())
                .unwrap();

        let mut seen = Vec::new();
        for batch in loader.iter() {
            assert_eq!(batch.embs.dims(), [2, 3]);
            let embs = batch.embs.into_data().to_vec::<f32>().unwrap();
            seen.extend(embs.chunks(3).map(|e| e[0] as usize));
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_multi_worker_run_trains() {
        let data = tempfile::tempdir().unwrap();
        let save = tempfile::tempdir().unwrap();
        write_corpus(data.path(), 4);

        let cfg = TrainConfig { num_workers: 2, ..config(data.path(), save.path()) };
        let outcome = run(&cfg);
        assert_eq!(outcome.last.unwrap().step, 4);
        // two full batches per pass
        assert_eq!(outcome.data_passes, 2);
        assert!(save.path().join("model-4.mpk.gz").exists());
    }
}
