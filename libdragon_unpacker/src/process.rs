use std::sync::mpsc::Sender;

use super::config::Config;
use super::error::ProcessorError;
use super::midas_stack::MidasStack;
use super::queue::Clock;
use super::summary_writer::{RunSummary, SummaryWriter};
use super::unpacker::Unpacker;
use super::worker_status::{WorkerPhase, WorkerStatus};

/// Hand everything the unpacker produced to the summary
fn collect_unpacked<C: Clock>(unpacker: &mut Unpacker<C>, summary: &mut RunSummary) {
    for event in unpacker.take_unpacked() {
        summary.tally(&event);
    }
}

/// The main loop of dragon_unpacker.
///
/// Reads every event of a run, routes it through the unpacker, drains the coincidence
/// queue at the end of the data, and writes the run summary.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let summary_path = config.get_summary_file_name(run_number)?;
    let mut stack = MidasStack::new(&config.midas_path, &config.get_run_str(run_number))?;
    let mut unpacker = Unpacker::new(&config.to_unpacker_config());
    let mut summary = RunSummary::new(run_number);

    let total_data_size = stack.total_stack_size_bytes;
    spdlog::info!(
        "Total run size: {}",
        human_bytes::human_bytes(total_data_size as f64)
    );
    if unpacker.is_singles_mode() {
        spdlog::info!("Unpacking in singles mode");
    } else {
        spdlog::info!(
            "Unpacking in coincidence mode with window {} and queue timeout {}",
            config.coinc_window,
            config.queue_timeout
        );
    }

    let flush_frac: f32 = 0.01;
    let flush_val = (total_data_size as f64 * flush_frac as f64) as u64;
    let mut last_report = 0;

    tx.send(WorkerStatus::new(
        0.0,
        run_number,
        *worker_id,
        WorkerPhase::Unpacking,
    ))?;
    while let Some(event) = stack.get_next_event()? {
        unpacker.unpack_midas_event(&event);
        collect_unpacked(&mut unpacker, &mut summary);

        let count = stack.get_bytes_read();
        if count - last_report > flush_val {
            last_report = count;
            tx.send(WorkerStatus::new(
                count as f32 / total_data_size as f32,
                run_number,
                *worker_id,
                WorkerPhase::Unpacking,
            ))?;
        }
    }

    // Runs cut short have no end of run event, so whatever is still queued is flushed here
    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        WorkerPhase::Draining,
    ))?;
    let drained = unpacker.drain_queue();
    if drained > 0 {
        spdlog::info!("Flushed {drained} events left in the queue after the last event");
    }
    collect_unpacked(&mut unpacker, &mut summary);

    summary.finish(
        unpacker.diagnostics(),
        unpacker.head_scaler(),
        unpacker.tail_scaler(),
        stack.get_bytes_read(),
    );
    if summary.run_parameters.run_number.is_none() {
        spdlog::warn!("Run {run_number} had no begin or end of run event");
        summary.run_parameters = unpacker.run_parameters().clone();
    }
    spdlog::info!(
        "Run {run_number}: {} coincidences, {} head singles, {} tail singles, {} decode failures",
        summary.coincidences,
        summary.head_singles,
        summary.tail_singles,
        summary.decode_failures
    );
    SummaryWriter::new(&summary_path).write(&summary)?;

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        WorkerPhase::Finished,
    ))?;
    Ok(())
}

/// The function to be called by a separate thread.
/// Allows multiple runs to be processed
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<(), ProcessorError> {
    let runs: Vec<i32> = (config.first_run_number..(config.last_run_number + 1)).collect();
    process_subset(config, tx, worker_id, runs)
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<(), ProcessorError> {
    for run in subset {
        if config.does_run_exist(run) {
            spdlog::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            spdlog::info!("Finished processing run {}.", run);
        } else {
            spdlog::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let n_subsets = config.n_threads.max(1) as usize;
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); n_subsets];

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::decoder::tests::data_word;
    use crate::midas_event::MidasEventBuilder;
    use std::sync::mpsc;

    #[test]
    fn test_create_subsets() {
        let config = Config {
            first_run_number: 1,
            last_run_number: 5,
            n_threads: 2,
            ..Default::default()
        };
        assert_eq!(create_subsets(&config), vec![vec![1, 3, 5], vec![2, 4]]);
    }

    fn write_run(dir: &std::path::Path, name: &str, events: &[MidasEventBuilder]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for event in events.iter() {
            bytes.extend_from_slice(&event.to_bytes());
        }
        std::fs::write(dir.join(name), &bytes).unwrap();
        bytes
    }

    fn run_config(dir: &std::path::Path, run_number: i32) -> Config {
        Config {
            midas_path: dir.to_path_buf(),
            output_path: dir.to_path_buf(),
            first_run_number: run_number,
            last_run_number: run_number,
            ..Default::default()
        }
    }

    #[test]
    fn test_process_run() {
        let dir = tempfile::tempdir().unwrap();
        let events = [
            MidasEventBuilder::new(MIDAS_BOR).serial_number(8).time_stamp(100),
            MidasEventBuilder::new(DRAGON_HEAD_EVENT)
                .bank_u32("ADC0", &[data_word(0, 50)])
                .bank_u32("TSCH", &[1_000]),
            MidasEventBuilder::new(DRAGON_TAIL_EVENT)
                .bank_u32("ADC0", &[data_word(0, 60)])
                .bank_u32("TSCT", &[1_004]),
            MidasEventBuilder::new(DRAGON_HEAD_EVENT).bank_u32("TSCH", &[90_000]),
            MidasEventBuilder::new(DRAGON_HEAD_SCALER)
                .time_stamp(101)
                .bank_u32("SCH0", &[5, 6]),
            MidasEventBuilder::new(MIDAS_EOR).serial_number(8).time_stamp(160),
        ];
        write_run(dir.path(), "run00008.mid", &events);

        let (tx, rx) = mpsc::channel();
        process(run_config(dir.path(), 8), tx, 0).unwrap();
        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        assert_eq!(statuses.last().map(|s| s.phase), Some(WorkerPhase::Finished));

        let text = std::fs::read_to_string(dir.path().join("run_00008.yml")).unwrap();
        assert!(text.contains("coincidences: 1"));
        assert!(text.contains("head_singles: 1"));
        assert!(text.contains("head_scaler_reads: 1"));
    }

    #[test]
    fn test_truncated_run_still_drains() {
        let dir = tempfile::tempdir().unwrap();
        let events = [
            MidasEventBuilder::new(MIDAS_BOR).serial_number(9).time_stamp(100),
            MidasEventBuilder::new(DRAGON_HEAD_EVENT)
                .bank_u32("ADC0", &[data_word(0, 50)])
                .bank_u32("TSCH", &[1_000]),
            MidasEventBuilder::new(DRAGON_TAIL_EVENT)
                .bank_u32("ADC0", &[data_word(0, 60)])
                .bank_u32("TSCT", &[1_002]),
        ];
        let bytes = write_run(dir.path(), "run00009.mid", &events);
        std::fs::write(dir.path().join("run00009.mid"), &bytes[..bytes.len() - 6]).unwrap();

        let (tx, _rx) = mpsc::channel();
        process(run_config(dir.path(), 9), tx, 0).unwrap();

        let text = std::fs::read_to_string(dir.path().join("run_00009.yml")).unwrap();
        assert!(text.contains("head_singles: 1"));
        assert!(text.contains("coincidences: 0"));
    }
}
