//! Behaviour tests for the service bot: ledger sequencing, handlers, routing.
//!
//! Run with: cargo test bot

use std::sync::Arc;

use super::providers::simulated::{SimulatedApex, SimulatedPluggy, SimulatedSmsActivate};
use super::*;

const ADMIN: i64 = 4242;
const USER: i64 = 123456;

struct Fixture {
    bot: ServiceBot,
    apex: Arc<SimulatedApex>,
    sms: Arc<SimulatedSmsActivate>,
    pluggy: Arc<SimulatedPluggy>,
}

fn fixture() -> Fixture {
    let apex = Arc::new(SimulatedApex::new());
    let sms = Arc::new(SimulatedSmsActivate::new());
    let pluggy = Arc::new(SimulatedPluggy::new("client-id".to_string()));
    let providers = Providers { followers: apex.clone(), phones: sms.clone(), accounts: pluggy.clone() };
    let settings = BotSettings { admin_id: ADMIN, ..Default::default() };
    Fixture { bot: ServiceBot::new(settings, providers), apex, sms, pluggy }
}

fn statuses(bot: &ServiceBot, operation: &str) -> Vec<Status> {
    bot.audit()
        .recent(usize::MAX)
        .into_iter()
        .filter(|r| r.operation == operation)
        .map(|r| r.status)
        .collect()
}

// =============================================================================
// LEDGER SEQUENCING
// =============================================================================

mod sequencing {
    use super::*;

    #[tokio::test]
    async fn test_broke_user_cannot_buy_number() {
        let f = fixture();

        let reply = f.bot.handle_buy_phone(USER, "test_user").await;

        assert!(reply.text.contains("Insufficient Balance"));
        assert!(reply.text.contains("R$ 5.00"));
        assert!(reply.text.contains("R$ 0.00"));
        assert_eq!(f.sms.calls(), 0, "provider must not be called without funds");
        assert_eq!(f.bot.ledger().get_balance(USER), 0.0);
        assert_eq!(statuses(&f.bot, "buy_phone"), [Status::Rejected]);
    }

    #[tokio::test]
    async fn test_connect_then_buy_number() {
        let f = fixture();

        f.bot.handle_connect_account(USER, "test_user").await;
        assert_eq!(f.bot.ledger().get_balance(USER), 100.0);

        let reply = f.bot.handle_buy_phone(USER, "test_user").await;
        assert_eq!(f.bot.ledger().get_balance(USER), 95.0);
        assert_eq!(f.sms.calls(), 1);
        assert!(reply.text.contains("Number Purchased"));
        assert!(reply.text.contains("<code>+5511"));
        assert_eq!(statuses(&f.bot, "buy_phone"), [Status::Success]);
    }

    #[tokio::test]
    async fn test_two_purchases_in_a_row() {
        let f = fixture();
        f.bot.handle_connect_account(USER, "test_user").await;

        f.bot.handle_buy_phone(USER, "test_user").await;
        f.bot.handle_buy_phone(USER, "test_user").await;

        assert_eq!(f.bot.ledger().get_balance(USER), 90.0);
        assert_eq!(f.sms.calls(), 2);
    }

    #[tokio::test]
    async fn test_connect_overwrites_balance() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 250.0).unwrap();

        f.bot.handle_connect_account(USER, "test_user").await;
        assert_eq!(f.bot.ledger().get_balance(USER), 100.0);

        f.bot.handle_buy_phone(USER, "test_user").await;
        f.bot.handle_connect_account(USER, "test_user").await;
        assert_eq!(f.bot.ledger().get_balance(USER), 100.0);
    }

    #[tokio::test]
    async fn test_provider_failure_refunds() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 12.0).unwrap();
        f.sms.set_failing(true);

        let reply = f.bot.handle_buy_phone(USER, "test_user").await;

        assert_eq!(f.sms.calls(), 1);
        assert_eq!(f.bot.ledger().get_balance(USER), 12.0);
        assert!(reply.text.contains("refunded"));
        assert_eq!(statuses(&f.bot, "buy_phone"), [Status::Refunded]);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_balance() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 3.0).unwrap();
        f.pluggy.set_failing(true);

        let reply = f.bot.handle_connect_account(USER, "test_user").await;

        assert!(reply.text.starts_with("❌ Error"));
        assert_eq!(f.bot.ledger().get_balance(USER), 3.0);
        assert_eq!(statuses(&f.bot, "connect_pluggy"), [Status::Error]);
    }

    #[tokio::test]
    async fn test_concurrent_purchases_never_overdraw() {
        let f = Arc::new(fixture());
        f.bot.ledger().set_balance(USER, 20.0).unwrap();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let f = f.clone();
                tokio::spawn(async move { f.bot.handle_buy_phone(USER, "test_user").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(f.sms.calls(), 4);
        assert_eq!(f.bot.ledger().get_balance(USER), 0.0);
    }
}

// =============================================================================
// FOLLOWERS
// =============================================================================

mod followers {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_without_link_shows_usage() {
        let f = fixture();
        let reply = f.bot.handle_buy_followers(USER, "u", &[]).await;
        assert!(reply.text.contains("/followers"));
        assert_eq!(f.apex.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejects_non_links() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 100.0).unwrap();
        let reply = f.bot.handle_buy_followers(USER, "u", &args(&["@me"])).await;
        assert!(reply.text.contains("doesn't look like"));
        assert_eq!(f.bot.ledger().get_balance(USER), 100.0);
    }

    #[tokio::test]
    async fn test_rejects_bad_quantity() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 100.0).unwrap();
        for q in ["0", "-5", "many"] {
            let reply = f.bot.handle_buy_followers(USER, "u", &args(&["https://x.com/me", q])).await;
            assert!(reply.text.contains("positive whole number"), "quantity {q}");
        }
        assert_eq!(f.apex.calls(), 0);
    }

    #[tokio::test]
    async fn test_default_bundle() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 100.0).unwrap();

        let reply = f.bot.handle_buy_followers(USER, "u", &args(&["https://instagram.com/me"])).await;

        assert!(reply.text.contains("Order Placed"));
        assert!(reply.text.contains("<code>APX-"));
        assert!(reply.text.contains("Quantity: 1000"));
        assert_eq!(f.bot.ledger().get_balance(USER), 90.0);
    }

    #[tokio::test]
    async fn test_custom_quantity_is_pro_rata() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 100.0).unwrap();

        f.bot.handle_buy_followers(USER, "u", &args(&["https://instagram.com/me", "250"])).await;

        assert_eq!(f.bot.ledger().get_balance(USER), 97.5);
    }

    #[tokio::test]
    async fn test_hundred_one_cent_orders_spend_exactly_one_real() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 1.0).unwrap();
        let order = args(&["https://instagram.com/me", "1"]);

        for i in 0..100 {
            let reply = f.bot.handle_buy_followers(USER, "u", &order).await;
            assert!(reply.text.contains("Order Placed"), "order {i}: {}", reply.text);
        }

        assert_eq!(f.bot.ledger().get_balance(USER), 0.0);
        assert_eq!(f.apex.calls(), 100);
        let reply = f.bot.handle_buy_followers(USER, "u", &order).await;
        assert!(reply.text.contains("Your balance: R$ 0.00"));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 9.99).unwrap();
        let reply = f.bot.handle_buy_followers(USER, "u", &args(&["https://instagram.com/me"])).await;
        assert!(reply.text.contains("Insufficient Balance"));
        assert_eq!(f.apex.calls(), 0);
        assert_eq!(f.bot.ledger().get_balance(USER), 9.99);
    }

    #[tokio::test]
    async fn test_seller_failure_refunds() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 10.0).unwrap();
        f.apex.set_failing(true);

        f.bot.handle_buy_followers(USER, "u", &args(&["https://instagram.com/me"])).await;

        assert_eq!(f.bot.ledger().get_balance(USER), 10.0);
        assert_eq!(statuses(&f.bot, "buy_followers"), [Status::Refunded]);
    }

    #[test]
    fn test_followers_cost_rounds_to_cents() {
        let settings = BotSettings { followers_price: 10.0, followers_quantity: 3, ..Default::default() };
        assert_eq!(settings.followers_cost(1), 3.33);
        assert_eq!(settings.followers_cost(3), 10.0);
    }
}

// =============================================================================
// ROUTING AND ADMIN
// =============================================================================

mod routing {
    use super::*;

    #[tokio::test]
    async fn test_start_for_user() {
        let f = fixture();
        let reply = f.bot.dispatch(&Incoming::text(USER, USER, "test_user", "/start")).await;
        assert!(reply.text.contains("Hello, test_user!"));
        assert_eq!(reply.keyboard, Some(keyboard::main_menu()));
        assert_eq!(statuses(&f.bot, "start"), [Status::Success]);
    }

    #[tokio::test]
    async fn test_start_for_admin() {
        let f = fixture();
        let reply = f.bot.dispatch(&Incoming::text(ADMIN, ADMIN, "boss", "/start")).await;
        assert!(reply.text.contains("Admin Panel"));
        assert_eq!(reply.keyboard, Some(keyboard::admin_menu()));
    }

    #[tokio::test]
    async fn test_username_is_escaped() {
        let f = fixture();
        let reply = f.bot.handle_start(1, 1, "<b>x</b>").await;
        assert!(reply.text.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[tokio::test]
    async fn test_callback_and_command_reach_same_handler() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 42.0).unwrap();

        let by_button = f.bot.dispatch(&Incoming::callback(USER, USER, "u", "check_balance")).await;
        let by_command = f.bot.dispatch(&Incoming::text(USER, USER, "u", "/balance")).await;

        assert_eq!(by_button, by_command);
        assert!(by_button.text.contains("R$ 42.00"));
    }

    #[tokio::test]
    async fn test_followers_command_passes_arguments() {
        let f = fixture();
        f.bot.ledger().set_balance(USER, 100.0).unwrap();
        f.bot
            .dispatch(&Incoming::text(USER, USER, "u", "/followers https://instagram.com/me 500"))
            .await;
        assert_eq!(f.apex.calls(), 1);
        assert_eq!(f.bot.ledger().get_balance(USER), 95.0);
    }

    #[tokio::test]
    async fn test_unknown_input_shows_menu() {
        let f = fixture();
        let reply = f.bot.dispatch(&Incoming::text(USER, USER, "u", "what can you do")).await;
        assert_eq!(reply.keyboard, Some(keyboard::main_menu()));
    }

    #[tokio::test]
    async fn test_admin_actions_refused_for_users() {
        let f = fixture();
        for data in ["admin_reports", "admin_users"] {
            let reply = f.bot.dispatch(&Incoming::callback(USER, USER, "u", data)).await;
            assert!(reply.text.contains("administrators only"));
        }
        assert_eq!(statuses(&f.bot, "admin_reports"), [Status::Rejected]);
        assert_eq!(statuses(&f.bot, "admin_users"), [Status::Rejected]);
    }

    #[tokio::test]
    async fn test_admin_users_lists_balances() {
        let f = fixture();
        f.bot.ledger().set_balance(7, 1.5).unwrap();
        f.bot.ledger().set_balance(USER, 95.0).unwrap();

        let reply = f.bot.dispatch(&Incoming::callback(ADMIN, ADMIN, "boss", "admin_users")).await;

        assert!(reply.text.contains("Users</b> (2)"));
        let first = reply.text.find("• 7: R$ 1.50").unwrap();
        let second = reply.text.find("• 123456: R$ 95.00").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_admin_users_empty() {
        let f = fixture();
        let reply = f.bot.handle_admin_users();
        assert!(reply.text.contains("No balances yet"));
    }

    #[tokio::test]
    async fn test_admin_reports_summarise_journal() {
        let f = fixture();
        f.bot.handle_connect_account(USER, "test_user").await;
        f.bot.handle_buy_phone(USER, "test_user").await;
        f.bot.handle_buy_phone(USER, "test_user").await;

        let reply = f.bot.dispatch(&Incoming::text(ADMIN, ADMIN, "boss", "/reports")).await;

        assert!(reply.text.contains("Operations: 3"));
        assert!(reply.text.contains("Revenue: R$ 10.00"));
        assert!(reply.text.contains("• buy_phone / success: 2"));
        assert!(reply.text.contains("• connect_pluggy / success: 1"));
        assert!(reply.text.contains("Latest"));
        assert_eq!(reply.keyboard, Some(keyboard::admin_menu()));
    }
}
