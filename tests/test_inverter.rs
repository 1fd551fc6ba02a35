mod common;
use common::*;
use sun2000_logger::error::TransportError;
use sun2000_logger::inverter::Phase;
use sun2000_logger::registers;

#[tokio::test]
async fn identity_accessors() {
    common_setup();

    let transport = Factory::transport(2);
    let mut inverter = Factory::inverter(&transport, 3);

    assert_eq!(inverter.model().await.unwrap(), "SUN2000-10KTL");
    assert_eq!(inverter.model_id().await.unwrap(), 428);
    assert_eq!(inverter.pv_string_count().await.unwrap(), 2);

    assert_eq!(transport.requests(), vec![(30000, 15), (30070, 1), (30071, 1)]);
}

#[tokio::test]
async fn pv_accessors_address_strings_from_one() {
    common_setup();

    let transport = Factory::transport(4);
    let mut inverter = Factory::inverter(&transport, 1);

    for index in 1..=4u16 {
        assert_eq!(
            inverter.pv_voltage(index).await.unwrap(),
            (6000 + index) as f64 / 10.0
        );
        assert_eq!(
            inverter.pv_current(index).await.unwrap(),
            (800 + index) as f64 / 100.0
        );
    }

    assert_eq!(
        transport.requests(),
        vec![
            (32016, 1),
            (32017, 1),
            (32018, 1),
            (32019, 1),
            (32020, 1),
            (32021, 1),
            (32022, 1),
            (32023, 1),
        ]
    );
}

#[tokio::test]
async fn electrical_accessors() {
    common_setup();

    let transport = Factory::transport(1);
    let mut inverter = Factory::inverter(&transport, 1);

    assert_eq!(inverter.phase_voltage(Phase::A).await.unwrap(), 230.1);
    assert_eq!(inverter.phase_voltage(Phase::C).await.unwrap(), 230.3);
    assert_eq!(inverter.phase_current(Phase::B).await.unwrap(), 14.002);
    assert_eq!(inverter.input_power().await.unwrap(), 10000);
    assert_eq!(inverter.active_power().await.unwrap(), 9900);
    assert_eq!(inverter.reactive_power().await.unwrap(), -200);
    assert_eq!(inverter.power_factor().await.unwrap(), 0.999);
    assert_eq!(inverter.efficiency().await.unwrap(), 99.0);
    assert_eq!(inverter.internal_temperature().await.unwrap(), 45.2);
    assert_eq!(inverter.device_status_code().await.unwrap(), 0x0200);
}

#[tokio::test]
async fn negative_temperature() {
    common_setup();

    let transport = Factory::transport(1);
    transport.set(registers::INTERNAL_TEMPERATURE.address, &[(-35i16) as u16]);
    let mut inverter = Factory::inverter(&transport, 1);

    assert_eq!(inverter.internal_temperature().await.unwrap(), -3.5);
}

#[tokio::test]
async fn retries_through_noise() {
    common_setup();

    let transport = Factory::transport(1);
    transport.script(
        registers::DEVICE_STATUS.address,
        vec![None, None, None, Some(vec![0x0300])],
    );
    let mut inverter = Factory::inverter(&transport, 10);

    assert_eq!(inverter.device_status_code().await.unwrap(), 0x0300);
    assert_eq!(transport.reads_of(registers::DEVICE_STATUS.address), 4);
    assert_eq!(inverter.retrier().stats().errors, 3);
}

#[tokio::test]
async fn exhausted_read_reports_last_error() {
    common_setup();

    let transport = Factory::transport(1);
    transport.fail(registers::ACTIVE_POWER.address);
    let mut inverter = Factory::inverter(&transport, 5);

    let err = inverter.active_power().await.unwrap_err();

    assert_eq!(err.attempts(), 5);
    assert!(matches!(err.last_error(), TransportError::Timeout));
    assert_eq!(transport.reads_of(registers::ACTIVE_POWER.address), 5);
}

#[tokio::test]
async fn short_response_is_retried() {
    common_setup();

    let transport = Factory::transport(1);
    transport.script(
        registers::INPUT_POWER.address,
        vec![Some(vec![0x0001]), Some(vec![0x0000, 0x0064])],
    );
    let mut inverter = Factory::inverter(&transport, 3);

    assert_eq!(inverter.input_power().await.unwrap(), 100);
    assert_eq!(transport.reads_of(registers::INPUT_POWER.address), 2);
}

#[tokio::test]
async fn zero_is_not_a_failure() {
    common_setup();

    let transport = Factory::transport(1);
    transport.set(registers::ACTIVE_POWER.address, &[0, 0]);
    let mut inverter = Factory::inverter(&transport, 3);

    assert_eq!(inverter.active_power().await.unwrap(), 0);
    assert_eq!(transport.reads_of(registers::ACTIVE_POWER.address), 1);
}

#[tokio::test]
async fn pv_index_outside_register_map_is_not_read() {
    common_setup();

    let transport = Factory::transport(1);
    let mut inverter = Factory::inverter(&transport, 5);

    for index in [0, registers::MAX_PV_STRINGS + 1, u16::MAX] {
        let err = inverter.pv_voltage(index).await.unwrap_err();
        assert_eq!(err.attempts(), 0);
        assert!(matches!(err.last_error(), TransportError::Protocol(_)));

        assert!(inverter.pv_current(index).await.is_err());
    }

    assert!(transport.requests().is_empty());
    assert_eq!(inverter.retrier().stats().total, 0);
}
