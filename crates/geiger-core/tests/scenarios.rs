//! End-to-end behaviour of the dose logger over realistic sample streams.

use geiger_core::storage::layout::{ADDR_ID, NVRAM_SIZE};
use geiger_core::storage::{PERSISTENT_CAPACITY, STAGING_CAPACITY};
use geiger_core::{
    DoseLogger, LogInfo, LogKind, LogSnapshot, LoggerState, Nvram, RamNvram, ReportWriter,
};

type Nv = RamNvram<NVRAM_SIZE>;

const BATTERY_MV: u16 = 3036;

fn ingest_n(logger: &mut DoseLogger<impl Nvram>, n: usize, counts: u32) {
    for _ in 0..n {
        logger.ingest(counts, BATTERY_MV).unwrap();
    }
}

fn dump(logger: &DoseLogger<impl Nvram>, kind: LogKind) -> String {
    let mut writer = ReportWriter::new(String::new());
    logger.fetch(kind, &mut writer).unwrap();
    writer.finish().unwrap()
}

#[test]
fn test_first_overflow_migrates_staging() {
    let mut logger = DoseLogger::boot(Nv::new()).unwrap();
    ingest_n(&mut logger, STAGING_CAPACITY, 5);
    assert_eq!(logger.info(LogKind::Persistent).length, 0);

    logger.ingest(5, BATTERY_MV).unwrap();

    let persistent = logger.snapshot(LogKind::Persistent).unwrap();
    assert_eq!(persistent.info().id, 1);
    assert_eq!(persistent.info().length as usize, STAGING_CAPACITY + 1);
    assert_eq!(persistent.info().scaling, 0);
    assert!(persistent.counts().iter().all(|&count| count == 5));
    assert_eq!(logger.state(), LoggerState::Merged);
}

#[test]
fn test_full_log_halves_resolution() {
    let mut logger = DoseLogger::boot(Nv::new()).unwrap();
    ingest_n(&mut logger, PERSISTENT_CAPACITY, 3);

    let info = logger.info(LogKind::Persistent);
    assert_eq!(info.length as usize, PERSISTENT_CAPACITY / 2);
    assert_eq!(info.resolution, 2);
    assert_eq!(info.scaling, 0);
    assert_eq!(logger.persistent().flush_amount(), 2);

    let snapshot = logger.snapshot(LogKind::Persistent).unwrap();
    assert!(snapshot.counts().iter().all(|&count| count == 6));
    assert_eq!(snapshot.total_counts(), 3 * PERSISTENT_CAPACITY as u64);

    // Two more samples make one more entry.
    ingest_n(&mut logger, 1, 3);
    assert_eq!(logger.info(LogKind::Persistent).length, 120);
    ingest_n(&mut logger, 1, 3);
    assert_eq!(logger.info(LogKind::Persistent).length, 121);
}

#[test]
fn test_huge_sample_after_migration_rescales() {
    let mut logger = DoseLogger::boot(Nv::new()).unwrap();
    ingest_n(&mut logger, STAGING_CAPACITY + 1, 5);

    logger.ingest(70_000, BATTERY_MV).unwrap();

    let snapshot = logger.snapshot(LogKind::Persistent).unwrap();
    assert_eq!(snapshot.info().scaling, 1);
    assert_eq!(snapshot.counts()[0], 3);
    assert_eq!(snapshot.counts()[STAGING_CAPACITY + 1], 35_000);
}

#[test]
fn test_huge_sample_in_staging_scales_on_migration() {
    let mut logger = DoseLogger::boot(Nv::new()).unwrap();
    ingest_n(&mut logger, 10, 5);
    logger.ingest(70_000, BATTERY_MV).unwrap();
    ingest_n(&mut logger, STAGING_CAPACITY - 11, 5);

    // Staging reports raw values.
    let staging = logger.snapshot(LogKind::Staging).unwrap();
    assert_eq!(staging.counts()[10], 70_000);
    assert_eq!(staging.info().scaling, 0);

    logger.ingest(5, BATTERY_MV).unwrap();
    let persistent = logger.snapshot(LogKind::Persistent).unwrap();
    assert_eq!(persistent.info().scaling, 1);
    assert_eq!(persistent.counts()[10], 35_000);
    assert_eq!(persistent.counts()[0], 3);
    assert_eq!(persistent.counts()[STAGING_CAPACITY], 3);
}

#[test]
fn test_export_is_idempotent() {
    let mut logger = DoseLogger::boot(Nv::new()).unwrap();
    ingest_n(&mut logger, 60, 9);

    let first = dump(&logger, LogKind::Persistent);
    assert_eq!(dump(&logger, LogKind::Persistent), first);

    logger.ingest(9, BATTERY_MV).unwrap();
    let second = dump(&logger, LogKind::Persistent);
    let before = LogSnapshot::parse(&first).unwrap();
    let after = LogSnapshot::parse(&second).unwrap();
    assert_eq!(after.info().length, before.info().length + 1);
    assert_eq!(&after.counts()[..before.counts().len()], before.counts());
    assert_eq!(after.counts().last(), Some(&9));
}

#[test]
fn test_export_after_append_at_nonzero_scaling() {
    let mut logger = DoseLogger::boot(Nv::new()).unwrap();
    logger.ingest(200_000, BATTERY_MV).unwrap();
    ingest_n(&mut logger, STAGING_CAPACITY, 9);

    let before = LogSnapshot::parse(&dump(&logger, LogKind::Persistent)).unwrap();
    assert_eq!(before.info().scaling, 2);
    assert_eq!(before.counts()[0], 50_000);

    logger.ingest(123, BATTERY_MV).unwrap();
    let after = LogSnapshot::parse(&dump(&logger, LogKind::Persistent)).unwrap();

    assert_eq!(after.info().scaling, 2);
    assert_eq!(after.info().length, before.info().length + 1);
    assert_eq!(&after.counts()[..before.counts().len()], before.counts());
    // 123 / 4 = 30.75 rounds to 31.
    assert_eq!(after.counts().last(), Some(&31));
    assert_eq!(after.decoded_counts().last(), Some(124));
}

#[test]
fn test_length_never_exceeds_capacity() {
    let mut logger = DoseLogger::boot(Nv::new()).unwrap();
    let mut last_resolution = 0;
    for sample in 0..20_000u32 {
        logger.ingest(sample % 17, 2900 + (sample % 300) as u16).unwrap();

        let info = logger.info(LogKind::Persistent);
        assert!((info.length as usize) < PERSISTENT_CAPACITY);
        assert!(info.resolution >= last_resolution);
        last_resolution = info.resolution;

        let staging = logger.info(LogKind::Staging);
        assert!(staging.length as usize <= STAGING_CAPACITY);
    }

    let snapshot = logger.snapshot(LogKind::Persistent).unwrap();
    assert!(snapshot.voltages_mv().all(|mv| (2900..3200).contains(&mv)));
}

#[test]
fn test_reset_then_export() {
    let mut logger = DoseLogger::boot(Nv::new()).unwrap();
    ingest_n(&mut logger, 100, 4);

    logger.reset_all().unwrap();

    assert_eq!(dump(&logger, LogKind::Persistent), "1,1,0,0\n\n\n");
    assert_eq!(dump(&logger, LogKind::Staging), "2,1,0,0\n\n\n");
}

#[test]
fn test_persistent_log_survives_reboot() {
    let mut nvram = Nv::erased();

    let before = {
        let mut logger = DoseLogger::boot(&mut nvram).unwrap();
        ingest_n(&mut logger, STAGING_CAPACITY + 25, 7);
        logger.snapshot(LogKind::Persistent).unwrap()
    };
    assert_eq!(nvram.read_word(ADDR_ID).unwrap(), 1);

    let logger = DoseLogger::boot(&mut nvram).unwrap();
    assert_eq!(logger.snapshot(LogKind::Persistent).unwrap(), before);
    assert_eq!(logger.info(LogKind::Staging), LogInfo::empty(2));
    assert_eq!(logger.state(), LoggerState::StagingActive);
}

#[test]
fn test_short_power_cycle_keeps_old_log() {
    let mut nvram = Nv::new();
    {
        let mut logger = DoseLogger::boot(&mut nvram).unwrap();
        ingest_n(&mut logger, STAGING_CAPACITY + 10, 2);
    }
    let image = *nvram.image();

    // A few minutes of uptime never reach NVRAM.
    let mut logger = DoseLogger::boot(&mut nvram).unwrap();
    ingest_n(&mut logger, 12, 50);
    drop(logger);

    assert_eq!(nvram.image(), &image);
}
