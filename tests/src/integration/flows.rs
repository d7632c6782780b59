//! # Integration Test Flows
//!
//! End-to-end runs of the controller inside the host simulation: requester,
//! controller and memory device exchanging timed packets with randomized
//! memory latency, so metadata returns in arbitrary order.
//!
//! ## Flows Tested:
//!
//! 1. **Mixed traffic**: reads and writes complete, data round-trips
//! 2. **Authentication**: genuine blocks pass, corrupted blocks are caught
//! 3. **Backpressure**: memory refusals, requester refusals, full buffers

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use secure_memory::{AuthenticatorKind, SecureMemoryApi, SecureMemoryConfig, SecureMemoryError};
    use shared_types::{Addr, AddrRange, MemCmd, Packet};

    use crate::harness::{init_tracing, SecureMemorySim, SimCpu, SimMemory};

    const DEVICE: AddrRange = AddrRange {
        start: 0,
        end: 1 << 20,
    };
    const BLOCK: usize = 64;
    /// Original (or write commit) + HMAC + four tree levels.
    const PACKETS_PER_ACCESS: u64 = 6;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn pattern(addr: Addr) -> Vec<u8> {
        (0..BLOCK)
            .map(|i| ((addr as usize / BLOCK) + i) as u8)
            .collect()
    }

    fn hmac_config() -> SecureMemoryConfig {
        SecureMemoryConfig::default().with_authenticator(AuthenticatorKind::HmacSha256 {
            key: b"integration-key".to_vec(),
        })
    }

    fn random_block(rng: &mut StdRng, region: AddrRange) -> Addr {
        let blocks = region.size() / BLOCK as u64;
        region.start + rng.gen_range(0..blocks) * BLOCK as u64
    }

    /// Simulation over a memory preloaded with `pattern` at `addrs`.
    fn preloaded_sim(
        config: SecureMemoryConfig,
        addrs: &[Addr],
        cpu: SimCpu,
        seed: u64,
        queue_limit: Option<usize>,
    ) -> SecureMemorySim {
        init_tracing();
        let mut memory = SimMemory::new(DEVICE, &config).unwrap();
        if let Some(limit) = queue_limit {
            memory = memory.with_queue_limit(limit);
        }
        for &addr in addrs {
            memory.preload(addr, pattern(addr));
        }
        SecureMemorySim::with_devices(config, memory, cpu, seed).unwrap()
    }

    fn assert_reads_match_pattern(sim: &SecureMemorySim) {
        for (_, pkt) in sim.completed() {
            if pkt.cmd() == MemCmd::ReadResp {
                assert_eq!(pkt.data(), Some(&pattern(pkt.addr())[..]), "{pkt}");
            }
        }
    }

    // =============================================================================
    // MIXED TRAFFIC
    // =============================================================================

    #[test]
    fn test_mixed_traffic_completes_under_random_latency() {
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let read_region = AddrRange::new(0, 0x40000);
            let reads: Vec<Addr> = (0..60)
                .map(|_| random_block(&mut rng, read_region))
                .collect();
            let writes: Vec<(Addr, Vec<u8>)> = (0..40u64)
                .map(|i| (0x40000 + i * 0x1040, vec![i as u8; BLOCK]))
                .collect();

            let mut sim = preloaded_sim(
                SecureMemoryConfig::default(),
                &reads,
                SimCpu::new(),
                seed,
                None,
            );
            for &addr in &reads {
                sim.issue_at(rng.gen_range(0..200_000), Packet::read(addr, BLOCK));
            }
            for (addr, data) in &writes {
                sim.issue_at(rng.gen_range(0..200_000), Packet::write(*addr, data.clone()));
            }

            sim.run().unwrap();

            let total = (reads.len() + writes.len()) as u64;
            assert_eq!(sim.completed().len() as u64, total, "seed {seed}");
            assert!(sim.is_settled(), "seed {seed}");

            let stats = sim.controller().stats();
            assert_eq!(stats.accesses_verified, total);
            assert_eq!(stats.requests_forwarded, total * PACKETS_PER_ACCESS);
            assert_eq!(stats.responses_forwarded, total);

            assert_reads_match_pattern(&sim);
            for (addr, data) in &writes {
                assert_eq!(sim.controller().memory().block(*addr), Some(&data[..]));
            }
        }
    }

    #[test]
    fn test_read_after_write_sees_new_data() {
        let mut sim = preloaded_sim(hmac_config(), &[], SimCpu::new(), 7, None);
        let payload = vec![0x5A; BLOCK];

        sim.issue_at(0, Packet::write(0x3000, payload.clone()));
        sim.run().unwrap();
        assert_eq!(sim.completed().len(), 1);

        let later = sim.now() + 1000;
        sim.issue_at(later, Packet::read(0x3000, BLOCK));
        sim.run().unwrap();

        let (_, read) = &sim.completed()[1];
        assert_eq!(read.cmd(), MemCmd::ReadResp);
        assert_eq!(read.data(), Some(&payload[..]));
    }

    // =============================================================================
    // AUTHENTICATION
    // =============================================================================

    #[test]
    fn test_hmac_reads_of_genuine_data_complete() {
        let mut rng = StdRng::seed_from_u64(42);
        let addrs: Vec<Addr> = (0..20)
            .map(|_| random_block(&mut rng, AddrRange::new(0, 0x80000)))
            .collect();
        let mut sim = preloaded_sim(hmac_config(), &addrs, SimCpu::new(), 42, None);

        for &addr in &addrs {
            sim.issue_at(rng.gen_range(0..50_000), Packet::read(addr, BLOCK));
        }
        sim.run().unwrap();

        assert_eq!(sim.completed().len(), addrs.len());
        assert_reads_match_pattern(&sim);
        assert!(sim.is_settled());
    }

    #[test]
    fn test_hmac_detects_corrupted_block() {
        let mut sim = preloaded_sim(hmac_config(), &[0x3000], SimCpu::new(), 1, None);
        sim.controller_mut().memory_mut().corrupt(0x3000);

        sim.issue_at(0, Packet::read(0x3000, BLOCK));
        let err = sim.run().unwrap_err();
        assert!(matches!(
            err,
            SecureMemoryError::IntegrityViolation { addr: 0x3000 }
        ));
        assert!(sim.completed().is_empty());
    }

    #[test]
    fn test_null_authenticator_passes_corrupted_block() {
        let mut sim = preloaded_sim(
            SecureMemoryConfig::default(),
            &[0x3000],
            SimCpu::new(),
            1,
            None,
        );
        sim.controller_mut().memory_mut().corrupt(0x3000);

        sim.issue_at(0, Packet::read(0x3000, BLOCK));
        sim.run().unwrap();

        let (_, pkt) = &sim.completed()[0];
        assert_ne!(pkt.data(), Some(&pattern(0x3000)[..]));
    }

    // =============================================================================
    // BACKPRESSURE
    // =============================================================================

    #[test]
    fn test_memory_refusals_never_duplicate_requests() {
        let addrs: Vec<Addr> = (0..30u64).map(|i| i * 0x840).collect();
        let mut sim = preloaded_sim(
            SecureMemoryConfig::default(),
            &addrs,
            SimCpu::new(),
            3,
            Some(2),
        );
        for (i, &addr) in addrs.iter().enumerate() {
            sim.issue_at(i as u64 * 500, Packet::read(addr, BLOCK));
        }
        sim.run().unwrap();

        assert_eq!(sim.completed().len(), addrs.len());
        assert_eq!(
            sim.controller().stats().requests_forwarded,
            addrs.len() as u64 * PACKETS_PER_ACCESS
        );
        assert_reads_match_pattern(&sim);
        assert!(sim.is_settled());
    }

    #[test]
    fn test_requester_refusals_are_retried() {
        let addrs: Vec<Addr> = (0..20u64).map(|i| i * 0x1000).collect();
        let mut sim = preloaded_sim(
            SecureMemoryConfig::default(),
            &addrs,
            SimCpu::refusing(5),
            9,
            None,
        );
        for &addr in &addrs {
            sim.issue_at(0, Packet::read(addr, BLOCK));
        }
        sim.run().unwrap();

        assert_eq!(sim.completed().len(), addrs.len());
        assert_reads_match_pattern(&sim);
        assert!(sim.is_settled());
    }

    #[test]
    fn test_burst_into_minimal_buffer_drains_through_retries() {
        let config = SecureMemoryConfig::default().with_inspection_buffer_entries(6);
        let addrs: Vec<Addr> = (0..20u64).map(|i| i * 0x2040).collect();
        let mut sim = preloaded_sim(config, &addrs, SimCpu::new(), 11, None);

        for &addr in &addrs {
            sim.issue_at(0, Packet::read(addr, BLOCK));
        }
        sim.run().unwrap();

        assert_eq!(sim.completed().len(), addrs.len());
        assert_eq!(sim.parked(), 0);
        let stats = sim.controller().stats();
        assert!(stats.requests_rejected > 0);
        assert!(stats.retries_sent > 0);
        assert_reads_match_pattern(&sim);
    }

    #[test]
    fn test_buffers_never_exceed_capacity() {
        let config = SecureMemoryConfig::default()
            .with_inspection_buffer_entries(16)
            .with_response_buffer_entries(4);
        let mut rng = StdRng::seed_from_u64(5);
        let addrs: Vec<Addr> = (0..50)
            .map(|_| random_block(&mut rng, AddrRange::new(0, 0x80000)))
            .collect();
        let mut sim = preloaded_sim(config, &addrs, SimCpu::refusing(3), 5, Some(4));

        for &addr in &addrs {
            sim.issue_at(rng.gen_range(0..20_000), Packet::read(addr, BLOCK));
        }

        while sim.step().unwrap() {
            assert!(sim.controller().inspection_len() <= 16);
            assert!(sim.controller().response_len() <= 4);
        }
        assert_eq!(sim.completed().len(), addrs.len());
    }

    // =============================================================================
    // PASS-THROUGH PATHS
    // =============================================================================

    #[test]
    fn test_functional_and_atomic_accesses_bypass_authentication() {
        let mut sim = preloaded_sim(SecureMemoryConfig::default(), &[], SimCpu::new(), 0, None);
        let controller = sim.controller_mut();

        let mut write = Packet::write(0x40, vec![9; BLOCK]);
        controller.recv_functional(&mut write);
        assert!(write.is_response());

        let mut read = Packet::read(0x40, BLOCK);
        let latency = controller.recv_atomic(&mut read);
        assert_eq!(latency, 1000 + 30_000);
        assert_eq!(read.data(), Some(&[9u8; BLOCK][..]));

        assert!(controller.next_event_time().is_none());
        assert_eq!(controller.get_addr_ranges(), vec![AddrRange::new(0, 0x80000)]);
    }
}
