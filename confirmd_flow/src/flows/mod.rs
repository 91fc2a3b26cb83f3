//! Scripted product flows. Only the confirmed-person flow ships today; the
//! onboarding variant reuses the same components with a different step list.

mod confirmed_person;

pub use self::confirmed_person::{
    ConfirmedPersonFlow, FlowSignal, CONFIRMED_PERSON_CREDENTIAL, FLOW_TYPE_CONFIRMED_PERSON,
    ISSUER_IMAGE_URL, ISSUER_LABEL, ISSUE_GOAL_CODE, WALLET_SCHEME,
};
