use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const INVALID_STATUS: &str = "Invalid status";

// {{{ DeviceStatus
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum DeviceStatus {
    StandbyInitializing = 0x0000,
    StandbyInsulationResistance = 0x0001,
    StandbyIrradiation = 0x0002,
    StandbyGridDetecting = 0x0003,
    Starting = 0x0100,
    OnGrid = 0x0200,
    GridPowerLimited = 0x0201,
    GridSelfDerating = 0x0202,
    ShutdownFault = 0x0300,
    ShutdownCommand = 0x0301,
    ShutdownOvgr = 0x0302,
    ShutdownCommunicationDisconnected = 0x0303,
    ShutdownPowerLimited = 0x0304,
    ShutdownManualStartup = 0x0305,
    ShutdownDcSwitchesDisconnected = 0x0306,
    ShutdownRapidCutoff = 0x0307,
    ShutdownInputUnderpower = 0x0308,
    SchedulingCosFP = 0x0401,
    SchedulingQU = 0x0402,
    SchedulingPfU = 0x0403,
    SchedulingDryContact = 0x0404,
    SchedulingQP = 0x0405,
    SpotCheckReady = 0x0500,
    SpotChecking = 0x0501,
    Inspecting = 0x0600,
    AfciSelfCheck = 0x0700,
    IvScanning = 0x0800,
    DcInputDetection = 0x0900,
    OffGridCharging = 0x0A00,
    StandbyNoIrradiation = 0xA000,
}

impl DeviceStatus {
    pub fn label(&self) -> &'static str {
        use DeviceStatus::*;

        match self {
            StandbyInitializing => "Standby: initializing",
            StandbyInsulationResistance => "Standby: detecting insulation resistance",
            StandbyIrradiation => "Standby: detecting irradiation",
            StandbyGridDetecting => "Standby: drid detecting",
            Starting => "Starting",
            OnGrid => "On-grid (Off-grid mode: running)",
            GridPowerLimited => {
                "Grid connection: power limited (Off-grid mode: running: power limited)"
            }
            GridSelfDerating => {
                "Grid connection: self-derating (Off-grid mode: running: self-derating)"
            }
            ShutdownFault => "Shutdown: fault",
            ShutdownCommand => "Shutdown: command",
            ShutdownOvgr => "Shutdown: OVGR",
            ShutdownCommunicationDisconnected => "Shutdown: communication disconnected",
            ShutdownPowerLimited => "Shutdown: power limited",
            ShutdownManualStartup => "Shutdown: manual startup required",
            ShutdownDcSwitchesDisconnected => "Shutdown: DC switches disconnected",
            ShutdownRapidCutoff => "Shutdown: rapid cutoff",
            ShutdownInputUnderpower => "Shutdown: input underpower",
            SchedulingCosFP => "Grid scheduling: cos F-P curve",
            SchedulingQU => "Grid scheduling: Q-U curve",
            SchedulingPfU => "Grid scheduling: PF-U curve",
            SchedulingDryContact => "Grid scheduling: dry contact",
            SchedulingQP => "Grid scheduling: Q-P curve",
            SpotCheckReady => "Spot-check ready",
            SpotChecking => "Spot-checking",
            Inspecting => "Inspecting",
            AfciSelfCheck => "AFCI self check",
            IvScanning => "I-V scanning",
            DcInputDetection => "DC input detection",
            OffGridCharging => "Running: off-grid charging",
            StandbyNoIrradiation => "Standby: no irradiation",
        }
    }
}
// }}}

/// Human readable label for a raw status register value. Unknown codes map
/// to [`INVALID_STATUS`].
pub fn status_label(code: u16) -> &'static str {
    DeviceStatus::try_from(code)
        .map(|status| status.label())
        .unwrap_or(INVALID_STATUS)
}
