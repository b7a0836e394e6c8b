use tokio::sync::oneshot;

use crate::{
    connection::StatusSnapshot,
    error::AppError,
    sigma::global::GlobalSettingsRecord,
    sigma::patch::{ParamId, PatchRecord},
};

#[derive(Debug)]
pub enum Command {
    Status {
        resp: oneshot::Sender<Result<StatusSnapshot, AppError>>,
    },
    GetPatch {
        resp: oneshot::Sender<Result<PatchRecord, AppError>>,
    },
    GetGlobal {
        resp: oneshot::Sender<Result<Option<GlobalSettingsRecord>, AppError>>,
    },
    SetParam {
        param: ParamId,
        value: u8,
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    SetName {
        name: String,
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    SelectPatch {
        group: u8,
        bank: u8,
        patch: u8,
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    RequestGlobalDump {
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    /// `slot: None` requests the edit buffer, `Some` a stored patch.
    RequestPatchDump {
        slot: Option<u8>,
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    /// Asks the device to report one parameter's current value; the
    /// answer comes back asynchronously as a ParamSet message.
    RequestParamValue {
        param: ParamId,
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    RequestPatternDump {
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    RequestSequencerDump {
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    RequestPatchName {
        resp: oneshot::Sender<Result<(), AppError>>,
    },
    // for testing and debugging
    Hi {
        resp: oneshot::Sender<Result<String, AppError>>,
    },
}
