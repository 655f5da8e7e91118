use anyhow::Result;
use border_replay_tables::{
    distribution::Combinator, AnySampler, ExperienceBufferBase, PerConfig, PrioritizedHeap,
    PrioritizedHeapConfig, PserConfig, ReplayBuffer, ReplayBufferBase, ReplayBufferConfig,
    ReplayError, SamplerConfig, Transition, WeightNormalizer,
};

type Obs = Vec<[f32; 2]>;
type Act = Vec<i64>;
type Buffer = ReplayBuffer<Obs, Act, AnySampler>;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tr(t: usize, is_terminated: bool) -> Transition<[f32; 2], i64> {
    Transition {
        obs: [t as f32, -(t as f32)],
        act: t as i64,
        reward: 1.0,
        discount: 0.9,
        is_terminated,
    }
}

fn buffer(max_size: usize, lag: usize, sampler: SamplerConfig) -> Result<Buffer> {
    let config = ReplayBufferConfig::default()
        .max_size(max_size)
        .lag(lag)
        .seed(7)
        .sampler(sampler);
    Buffer::build(&config)
}

#[test]
fn test_circular_overwrite() -> Result<()> {
    init();
    let (max_size, k) = (5, 3);
    let mut b = buffer(max_size, 1, SamplerConfig::Uniform)?;
    let eids = (0..max_size + k)
        .map(|t| b.add(tr(t, t == max_size + k - 1), None))
        .collect::<Result<Vec<_>>>()?;

    assert_eq!(b.size(), max_size);
    assert_eq!(b.len(), max_size);
    for &eid in eids[..k].iter() {
        let err = b.get(&[eid]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReplayError>(),
            Some(&ReplayError::StaleHandle(eid))
        );
    }
    let batch = b.get(&eids[k..])?;
    assert_eq!(batch.len(), max_size);
    assert_eq!(batch.act, (k as i64..(max_size + k) as i64).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_n_step_batch() -> Result<()> {
    init();
    let mut b = buffer(100, 3, SamplerConfig::Uniform)?;
    for t in 0..8 {
        b.push(tr(t, t == 4))?;
    }

    // window of 3 steps within the episode
    let batch = b.get(&[0])?;
    assert!((batch.reward[0] - (1.0 + 0.9 + 0.81)).abs() < 1e-6);
    assert!((batch.discount[0] - 0.729).abs() < 1e-6);
    assert_eq!(batch.next_obs, vec![[3.0, -3.0]]);
    assert_eq!(batch.is_terminated, vec![0]);

    // window cut by the terminal step 4
    let batch = b.get(&[3])?;
    assert!((batch.reward[0] - 1.9).abs() < 1e-6);
    assert_eq!(batch.is_terminated, vec![1]);
    assert_eq!(batch.next_obs, vec![[4.0, -4.0]]);

    // steps of the second episode are still pending
    assert_eq!(b.size(), 5);
    let err = b.get(&[5]).unwrap_err();
    assert_eq!(err.downcast_ref::<ReplayError>(), Some(&ReplayError::Pending(5)));
    Ok(())
}

#[test]
fn test_pser_propagation() -> Result<()> {
    init();
    let config = PserConfig::default()
        .per(
            PerConfig::default()
                .priority_exponent(1.0)
                .uniform_probability(0.0),
        )
        .trace_decay(0.5)
        .trace_depth(3)
        .combinator(Combinator::Sum);
    let mut b = buffer(20, 1, SamplerConfig::Pser(config))?;
    for t in 0..10 {
        b.add(tr(t, t == 3 || t == 9), Some(1.0))?;
    }
    assert_eq!(b.size(), 10);

    b.update_priorities(&[6], &[8.0])?;
    let s = match b.sampler() {
        AnySampler::PrioritySequence(s) => s,
        _ => unreachable!(),
    };
    assert_eq!(s.priority(6), 8.0);
    assert_eq!(s.priority(5), 1.0 + 4.0);
    assert_eq!(s.priority(4), 1.0 + 2.0);
    assert_eq!(s.priority(3), 1.0);
    assert!((s.total_priority() - (10.0 - 3.0 + 8.0 + 5.0 + 3.0)).abs() < 1e-9);

    // masked items receive nothing and are never sampled
    b.mask_sample(8)?;
    b.update_priorities(&[9, 8], &[4.0, 4.0])?;
    let s = match b.sampler() {
        AnySampler::PrioritySequence(s) => s,
        _ => unreachable!(),
    };
    assert_eq!(s.priority(8), 0.0);
    assert_eq!(s.priority(7), 1.0);

    let batch = b.sample(500)?;
    assert!(batch.eids.iter().all(|&eid| eid != 8));
    Ok(())
}

#[test]
fn test_per_weights() -> Result<()> {
    init();
    let per = PerConfig::default()
        .priority_exponent(1.0)
        .uniform_probability(0.0);
    let config = ReplayBufferConfig::default()
        .max_size(10)
        .lag(1)
        .normalize(WeightNormalizer::BatchMax)
        .sampler(SamplerConfig::Per(per));
    let mut b = Buffer::build(&config)?;
    for t in 0..4 {
        b.add(tr(t, t == 3), Some(1.0))?;
    }
    b.update_priority(&[0], &[3.0])?;

    let batch = b.batch(64)?;
    let max = batch.weight.iter().cloned().fold(0.0, f64::max);
    assert!((max - 1.0).abs() < 1e-12);
    for (&eid, &w) in batch.eids.iter().zip(batch.weight.iter()) {
        // EID 0 is three times as likely as the others
        let expected = if eid == 0 { 1.0 / 3.0 } else { 1.0 };
        assert!((w - expected).abs() < 1e-9);
    }

    let batch = b.stratified_sample(6)?;
    assert_eq!(batch.eids, vec![0, 0, 0, 1, 2, 3]);
    Ok(())
}

#[test]
fn test_sampling_is_deterministic() -> Result<()> {
    init();
    let run = || -> Result<Vec<u64>> {
        let mut b = buffer(50, 2, SamplerConfig::Per(PerConfig::default()))?;
        for t in 0..60 {
            b.add(tr(t, t % 20 == 19), None)?;
        }
        let batch = b.sample(16)?;
        let td = batch.eids.iter().map(|&e| e as f64 * 0.1).collect::<Vec<_>>();
        b.update_priorities(&batch.eids, &td)?;
        Ok(b.sample(16)?.eids)
    };
    assert_eq!(run()?, run()?);
    Ok(())
}

#[test]
fn test_threshold_heap() -> Result<()> {
    init();
    let mut h = PrioritizedHeap::new(3, PrioritizedHeapConfig::default().threshold(1.0))?;
    assert_eq!(h.add(tr(0, false), 0.5)?, None);
    for (t, p) in [(1, 2.0), (2, 4.0), (3, 3.0)].iter() {
        assert!(h.add(tr(*t, false), *p)?.is_some());
    }
    assert_eq!(h.size(), 3);

    // below the minimum held priority: discarded
    assert_eq!(h.add(tr(4, false), 1.5)?, None);
    assert_eq!(h.size(), 3);

    // above it: the item of priority 2 is evicted
    h.add(tr(5, false), 5.0)?;
    let (items, _, weights) = h.sample(4)?;
    assert_eq!(
        items.iter().map(|tr| tr.act).collect::<Vec<_>>(),
        vec![5, 2, 3]
    );
    assert_eq!(weights, vec![1.0; 3]);
    assert!(h.is_empty());
    Ok(())
}

#[test]
fn test_build_from_saved_config() -> Result<()> {
    init();
    let config = ReplayBufferConfig::default()
        .max_size(30)
        .lag(2)
        .seed(11)
        .normalize(WeightNormalizer::BatchMax)
        .sampler(SamplerConfig::Pser(PserConfig::default().trace_depth(2)));
    let dir = tempdir::TempDir::new("replay_buffer")?;
    let path = dir.path().join("replay_buffer.yaml");
    config.save(&path)?;

    let mut eids = vec![];
    for config in [config, ReplayBufferConfig::load(&path)?].iter() {
        let mut b = Buffer::build(config)?;
        for t in 0..40 {
            b.add(tr(t, t % 8 == 7), None)?;
        }
        eids.push(b.sample(8)?.eids);
    }
    assert_eq!(eids[0], eids[1]);
    Ok(())
}

#[test]
fn test_flush_ends_cut_off_episode() -> Result<()> {
    init();
    let mut b = buffer(20, 3, SamplerConfig::Uniform)?;
    for t in 0..3 {
        b.add(tr(t, false), None)?;
    }
    b.flush()?;
    assert_eq!(b.size(), 3);

    // the next episode must not leak into the windows of the cut-off one
    for t in 3..5 {
        let mut step = tr(t, false);
        step.reward = 100.0;
        b.add(step, None)?;
    }
    let batch = b.get(&[1])?;
    assert!((batch.reward[0] - 1.9).abs() < 1e-6);
    assert_eq!(batch.next_obs, vec![[2.0, -2.0]]);
    assert_eq!(batch.is_terminated, vec![0]);
    assert_eq!(b.size(), 3);

    // backward credit stops at the truncated step too
    let config = PserConfig::default()
        .per(PerConfig::default().priority_exponent(1.0))
        .trace_decay(0.5)
        .combinator(Combinator::Sum);
    let mut b = buffer(20, 1, SamplerConfig::Pser(config))?;
    for t in 0..2 {
        b.add(tr(t, false), Some(1.0))?;
    }
    b.flush()?;
    for t in 2..4 {
        b.add(tr(t, t == 3), Some(1.0))?;
    }
    b.update_priorities(&[2], &[8.0])?;
    let s = match b.sampler() {
        AnySampler::PrioritySequence(s) => s,
        _ => unreachable!(),
    };
    assert_eq!(s.priority(2), 8.0);
    assert_eq!(s.priority(1), 1.0);
    Ok(())
}
