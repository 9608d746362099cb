use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_malformed_script_handling() {
    let file = common::script(&[
        "fund, alice, , , 3000",
        // Unknown command type
        "refund, alice, , , 100",
        // Missing payee
        "pay, alice, , , 100",
        // Valid payment again
        "pay, alice, bob, , 2000",
    ]);

    let mut cmd = Command::new(cargo_bin!("fluxpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stderr(predicate::str::contains("Pay requires `payee`"))
        .stdout(predicate::str::contains("alice,1000"))
        .stdout(predicate::str::contains("bob,1980"));
}

#[test]
fn test_invalid_data_types() {
    let file = common::script(&[
        "fund, alice, , , not_a_number",
        "charge, , , -1",
        "fund, alice, , , 500",
    ]);

    let mut cmd = Command::new(cargo_bin!("fluxpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains("alice,500"));
}

#[test]
fn test_rejected_requests_do_not_consume_ids() {
    let file = common::script(&[
        "pay, alice, bob, , 0",
        "pay, alice, bob, , 100",
        "subscribe, alice, bob, , 100, 0",
        "fund, alice, , , 100",
        "pay, alice, bob, , 100",
        "subscribe, alice, bob, , 100, 5",
    ]);

    let mut cmd = Command::new(cargo_bin!("fluxpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("amount must be greater than zero"))
        .stderr(predicate::str::contains("frequency must be greater than zero"))
        .stdout(predicate::str::contains("0,alice,bob,100,99,1,completed,0"))
        .stdout(predicate::str::contains("0,alice,bob,100,5,0,5,active"));
}

#[test]
fn test_missing_input_file_fails() {
    let mut cmd = Command::new(cargo_bin!("fluxpay"));
    cmd.arg("tests/fixtures/does_not_exist.csv");

    cmd.assert().failure();
}

#[test]
fn test_charge_unknown_subscription() {
    let file = common::script(&[
        "fund, alice, , , 1000",
        "advance, , , , 50",
        "charge, , , 9",
    ]);

    let mut cmd = Command::new(cargo_bin!("fluxpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("subscription 9 not found"))
        .stdout(predicate::str::contains("alice,1000"));
}

#[test]
fn test_huge_fee_rate_from_non_owner_is_unauthorized() {
    let file = common::script(&["set-fee, mallory, , , 18446744073709551615"]);

    let mut cmd = Command::new(cargo_bin!("fluxpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("caller mallory is not authorized"))
        .stderr(predicate::str::contains("exceeds 10000").not());
}
