use alloy_primitives::Address;
use alloy_primitives::utils::format_units;
use std::fmt::Write;

use crate::events::DeploymentEvent;
use crate::metadata::TokenMetadata;
use crate::registry::Language;

/// Dev-buy amounts are always quoted in the native asset's base units.
const DEV_BUY_DECIMALS: u8 = 18;

struct Labels {
    new_token: &'static str,
    contract: &'static str,
    symbol: &'static str,
    decimals: &'static str,
    dev_buy: &'static str,
    description: &'static str,
    website: &'static str,
    telegram: &'static str,
    twitter: &'static str,
    unset: &'static str,
    cap_alert: &'static str,
    market_cap: &'static str,
    threshold: &'static str,
}

const EN: Labels = Labels {
    new_token: "🚀 New token deployed",
    contract: "Contract",
    symbol: "Symbol",
    decimals: "Decimals",
    dev_buy: "Dev buy",
    description: "Description",
    website: "Website",
    telegram: "Telegram",
    twitter: "Twitter",
    unset: "unset",
    cap_alert: "📈 Market cap alert",
    market_cap: "Market cap",
    threshold: "Your threshold",
};

const RU: Labels = Labels {
    new_token: "🚀 Новый токен",
    contract: "Контракт",
    symbol: "Символ",
    decimals: "Десятичные",
    dev_buy: "Покупка разработчика",
    description: "Описание",
    website: "Сайт",
    telegram: "Телеграм",
    twitter: "Твиттер",
    unset: "не указано",
    cap_alert: "📈 Оповещение о капитализации",
    market_cap: "Капитализация",
    threshold: "Ваш порог",
};

const ZH: Labels = Labels {
    new_token: "🚀 新代币已部署",
    contract: "合约",
    symbol: "代号",
    decimals: "精度",
    dev_buy: "开发者买入",
    description: "描述",
    website: "网站",
    telegram: "电报",
    twitter: "推特",
    unset: "未设置",
    cap_alert: "📈 市值提醒",
    market_cap: "市值",
    threshold: "您的阈值",
};

fn labels(language: Language) -> &'static Labels {
    match language {
        Language::En => &EN,
        Language::Ru => &RU,
        Language::Zh => &ZH,
    }
}

/// Base units rendered at 18 decimal places.
pub fn format_dev_buy(event: &DeploymentEvent) -> String {
    format_units(event.dev_buy, DEV_BUY_DECIMALS).unwrap_or_else(|_| event.dev_buy.to_string())
}

pub fn render_deployment(
    language: Language,
    event: &DeploymentEvent,
    metadata: &TokenMetadata,
) -> String {
    let l = labels(language);
    let or_unset = |value: Option<&str>| value.unwrap_or(l.unset).to_string();
    let decimals = metadata
        .decimals
        .map(|d| d.to_string())
        .unwrap_or_else(|| l.unset.to_string());

    let mut text = String::new();
    let _ = writeln!(text, "{}", l.new_token);
    let _ = writeln!(text, "{}: {}", l.contract, event.token);
    let _ = writeln!(text, "{}: {}", l.symbol, or_unset(metadata.symbol.as_deref()));
    let _ = writeln!(text, "{}: {}", l.decimals, decimals);
    let _ = writeln!(text, "{}: {}", l.dev_buy, format_dev_buy(event));
    let _ = writeln!(
        text,
        "{}: {}",
        l.description,
        or_unset(metadata.description.as_deref())
    );
    let _ = writeln!(text, "{}: {}", l.website, or_unset(metadata.website.as_deref()));
    let _ = writeln!(text, "{}: {}", l.telegram, or_unset(metadata.telegram.as_deref()));
    let _ = write!(text, "{}: {}", l.twitter, or_unset(metadata.twitter.as_deref()));
    text
}

pub fn render_market_cap_alert(
    language: Language,
    token: Address,
    market_cap_usd: f64,
    threshold_usd: u64,
) -> String {
    let l = labels(language);
    format!(
        "{}\n{}: {}\n{}: ${:.2}\n{}: ${}",
        l.cap_alert, l.contract, token, l.market_cap, market_cap_usd, l.threshold, threshold_usd
    )
}
