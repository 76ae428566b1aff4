//! Built-in symbol lists

use forecast_core::Symbol;
use indexmap::IndexSet;

/// Fixed priority list kept warm in the cache
pub const POPULAR_SYMBOLS: &[&str] = &[
    // Indian large caps
    "RELIANCE.NS",
    "TCS.NS",
    "HDFCBANK.NS",
    "INFY.NS",
    "HINDUNILVR.NS",
    "ICICIBANK.NS",
    "SBIN.NS",
    "BAJFINANCE.NS",
    "BHARTIARTL.NS",
    "KOTAKBANK.NS",
    // US large caps
    "AAPL",
    "MSFT",
    "AMZN",
    "GOOGL",
    "META",
];

pub const NIFTY_SYMBOLS: &[&str] = &[
    "RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "HINDUNILVR.NS",
    "ICICIBANK.NS", "SBIN.NS", "BAJFINANCE.NS", "BHARTIARTL.NS", "KOTAKBANK.NS",
    "ITC.NS", "LT.NS", "HCLTECH.NS", "ASIANPAINT.NS", "AXISBANK.NS",
    "MARUTI.NS", "SUNPHARMA.NS", "TATAMOTORS.NS", "TITAN.NS", "BAJAJFINSV.NS",
    "WIPRO.NS", "ADANIENT.NS", "NTPC.NS", "POWERGRID.NS", "ULTRACEMCO.NS",
    "ADANIPORTS.NS", "JSWSTEEL.NS", "TECHM.NS", "GRASIM.NS", "ONGC.NS",
    "TATASTEEL.NS", "APOLLOHOSP.NS", "NESTLEIND.NS", "DIVISLAB.NS", "COALINDIA.NS",
    "HINDALCO.NS", "BAJAJ-AUTO.NS", "TATACONSUM.NS", "UPL.NS", "INDUSINDBK.NS",
    "CIPLA.NS", "DRREDDY.NS", "M&M.NS", "EICHERMOT.NS", "HEROMOTOCO.NS",
    "BRITANNIA.NS", "VEDL.NS", "GODREJCP.NS", "DLF.NS", "DABUR.NS",
    "PNB.NS", "BANKBARODA.NS", "INDIGO.NS", "ZOMATO.NS", "PAYTM.NS",
];

pub const SP500_SYMBOLS: &[&str] = &[
    "AAPL", "MSFT", "AMZN", "GOOGL", "META", "TSLA", "NVDA", "JPM", "JNJ", "V",
    "PG", "UNH", "HD", "BAC", "XOM", "ADBE", "NFLX", "DIS", "CSCO", "PFE",
    "CRM", "INTC", "VZ", "PYPL", "BABA", "CVX", "BA", "MCD", "SBUX", "NKE",
    "GS", "QCOM", "IBM", "ORCL", "TM", "SONY", "HSBC", "BP",
];

fn symbols<'a>(raw: &'a [&'a str]) -> impl Iterator<Item = Symbol> + 'a {
    raw.iter().map(|s| Symbol::new(s))
}

/// Popular, NIFTY and S&P lists merged in that order without duplicates
pub fn builtin_universe() -> IndexSet<Symbol> {
    symbols(POPULAR_SYMBOLS)
        .chain(symbols(NIFTY_SYMBOLS))
        .chain(symbols(SP500_SYMBOLS))
        .collect()
}

/// The popular list, padded from the built-in universe up to `limit`
pub fn popular(limit: usize) -> Vec<Symbol> {
    builtin_universe().into_iter().take(limit).collect()
}

/// One symbol per line; `#` comments and anything after a comma ignored
pub fn parse_symbol_list(body: &str) -> Vec<Symbol> {
    body.lines()
        .map(|line| line.split(',').next().unwrap_or_default().trim())
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .map(Symbol::new)
        .collect()
}
