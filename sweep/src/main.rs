use sim_split::{FingerprintMatrix, FitInput, SimThresholdSplit, SplitConfig};

use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

//dense mode holds n * (n - 1) / 2 distances at once
const DENSE_MAX_INSTANCES: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Setting {
    n_instances: usize,
    memory_optimized: bool,
    block_width: usize,
    n_jobs: i32,
}

fn settings() -> Vec<Setting> {

    let mut out = Vec::new();
    for n_instances in [1000, 5000, 20000].into_iter() {
        for memory_optimized in [false, true].into_iter() {
            for block_width in [250, 1000].into_iter() {
                for n_jobs in [1, 4, -1].into_iter() {

                    if !memory_optimized {
                        // nothing to tune in dense mode
                        if block_width != 250 || n_jobs != 1 || n_instances > DENSE_MAX_INSTANCES {
                            continue;
                        }
                    }

                    out.push(Setting { n_instances, memory_optimized, block_width, n_jobs });
                }
            }
        }
    }

    return out;
}

fn main() {

    env_logger::init();

    let mut rng = StdRng::seed_from_u64(0);
    let mut config = SplitConfig::default();
    let mut fps = FingerprintMatrix::random_binary(0, 1024, 0.1, &mut rng);

    for setting in settings() {

        if fps.len() != setting.n_instances {
            fps = FingerprintMatrix::random_binary(setting.n_instances, 1024, 0.1, &mut rng);
        }

        config.memory_optimized = setting.memory_optimized;
        config.block_width = setting.block_width;
        config.n_jobs = setting.n_jobs;

        let name = format!("n_{}_optimized_{}_width_{}_jobs_{}", setting.n_instances, setting.memory_optimized, setting.block_width, setting.n_jobs);

        let mut splitter = match SimThresholdSplit::new(config.clone()) {
            Ok(splitter) => splitter,
            Err(e) => {
                error!("{}: {}", &name, e);
                continue;
            },
        };

        let start = Instant::now();
        match splitter.fit(FitInput::fingerprints(fps.clone())) {
            Ok(fitted) => {
                let duration = start.elapsed();
                info!("{}: {} pairs, threshold {:.4}, {}", &name, fitted.pairs.len(), fitted.threshold, &duration.as_secs_f64());
            },
            Err(e) => error!("{}: {}", &name, e),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn dense_mode_only_on_small_sets() {

        let all = settings();

        let dense: Vec<&Setting> = all.iter().filter(|s| !s.memory_optimized).collect();
        assert_eq!(dense.len(), 2);
        assert!(dense.iter().all(|s| s.n_instances <= DENSE_MAX_INSTANCES));

        assert!(all.iter().any(|s| s.memory_optimized && s.n_instances == 20000));
    }
}
