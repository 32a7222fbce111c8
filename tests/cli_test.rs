use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("marketpay"));
    cmd.arg("tests/fixtures/scenario.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "order,buyer,status,payment_status,total,payment_ref,refund_ref",
        ))
        .stdout(predicate::str::contains("buyer1,pending,pending,110.00,,"))
        // One audit entry per seller, both carrying the order total
        .stdout(predicate::str::contains("buyer1,seller1,110.00,OrderCreated"))
        .stdout(predicate::str::contains("buyer1,seller2,110.00,OrderCreated"));

    Ok(())
}

#[test]
fn test_buy_and_cancel_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, user, order, product, quantity, payment_method, value").unwrap();
    writeln!(file, "account, buyer2, , , , , buyer").unwrap();
    writeln!(file, "account, seller3, , , , acct_s3, seller").unwrap();
    writeln!(file, "listing, seller3, , lamp, , , 20.00").unwrap();
    writeln!(file, "buy, buyer2, , lamp, , pm_card_visa, ").unwrap();
    writeln!(file, "cancel, buyer2, @1, , , , ").unwrap();

    let mut cmd = Command::new(cargo_bin!("marketpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "buyer2,cancelled,refunded,20.00,pay-1,re-1",
        ))
        .stdout(predicate::str::contains("OrderCreated"))
        .stdout(predicate::str::contains("OrderCancelled"));
}

#[test]
fn test_declined_payment_leaves_no_order() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, user, order, product, quantity, payment_method, value").unwrap();
    writeln!(file, "account, buyer2, , , , , buyer").unwrap();
    writeln!(file, "account, seller3, , , , acct_s3, seller").unwrap();
    writeln!(file, "listing, seller3, , lamp, , , 20.00").unwrap();
    writeln!(file, "buy, buyer2, , lamp, , pm_declined_expired, ").unwrap();

    let mut cmd = Command::new(cargo_bin!("marketpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("pay-1").not())
        .stdout(predicate::str::contains("OrderCreated").not());
}

#[test]
fn test_dispute_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, user, order, product, quantity, payment_method, value").unwrap();
    writeln!(file, "account, buyer1, , , , , buyer").unwrap();
    writeln!(file, "account, seller1, , , , acct_s1, seller").unwrap();
    writeln!(file, "listing, seller1, , widget, , , 50.00").unwrap();
    writeln!(file, "add, buyer1, , widget, 1, , ").unwrap();
    writeln!(file, "checkout, buyer1, , , , , 12 Main St").unwrap();
    writeln!(file, "dispute, buyer1, @1, , , , item never arrived").unwrap();

    let mut cmd = Command::new(cargo_bin!("marketpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("buyer1,disputed,pending,50.00,,"))
        .stdout(predicate::str::contains("DisputeRaised"));
}

#[test]
fn test_seller_summary_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, user, order, product, quantity, payment_method, value").unwrap();
    writeln!(file, "account, buyer1, , , , , buyer").unwrap();
    writeln!(file, "account, seller1, , , , acct_s1, seller").unwrap();
    writeln!(file, "listing, seller1, , widget, , , 50.00").unwrap();
    writeln!(file, "add, buyer1, , widget, 1, , ").unwrap();
    writeln!(file, "checkout, buyer1, , , , , 12 Main St").unwrap();
    writeln!(file, "buy, buyer1, , widget, , pm_card_visa, ").unwrap();
    writeln!(file, "summary, seller1, , , , , ").unwrap();

    let mut cmd = Command::new(cargo_bin!("marketpay"));
    cmd.arg(file.path());

    // Two orders for the seller, one still pending; only the paid direct
    // purchase contributes revenue.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("seller,orders,pending,revenue"))
        .stdout(predicate::str::contains("seller1,2,1,50.00"));
}

#[test]
fn test_admin_update_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, user, order, product, quantity, payment_method, value").unwrap();
    writeln!(file, "account, buyer1, , , , , buyer").unwrap();
    writeln!(file, "account, admin1, , , , , admin").unwrap();
    writeln!(file, "account, seller1, , , , acct_s1, seller").unwrap();
    writeln!(file, "listing, seller1, , widget, , , 50.00").unwrap();
    writeln!(file, "add, buyer1, , widget, 1, , ").unwrap();
    writeln!(file, "checkout, buyer1, , , , , 12 Main St").unwrap();
    writeln!(file, "update, admin1, @1, , , , pending:processing").unwrap();
    // Stale expected status: rejected, leaves the order as-is
    writeln!(file, "update, admin1, @1, , , , pending:completed").unwrap();
    // Buyers cannot drive admin updates
    writeln!(file, "update, buyer1, @1, , , , processing:completed").unwrap();

    let mut cmd = Command::new(cargo_bin!("marketpay"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("buyer1,processing,pending,50.00,,"))
        .stdout(predicate::str::contains("OrderUpdated"));
}
