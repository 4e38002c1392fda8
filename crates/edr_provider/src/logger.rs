use std::sync::Arc;

use dyn_clone::DynClone;
use edr_block_miner::{ExecutedTransaction, LocalBlock};
use edr_evm::result::ExecutionResult;
use edr_primitives::{B256, U256};
use edr_transaction::Signed;

use crate::{error::TransactionFailureReason, ProviderError, TransactionFailure};

/// An error that occurs while printing a log line.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// The line could not be printed.
    #[error("Failed to print line")]
    PrintLine,
}

/// Consumer of the events that the provider emits while handling requests.
///
/// Loggers only observe; they never influence the outcome of a request.
pub trait Logger {
    /// Whether the logger is enabled.
    fn is_enabled(&self) -> bool;

    /// Sets whether the logger is enabled.
    fn set_is_enabled(&mut self, is_enabled: bool);

    /// Logs the result of an `eth_call`.
    fn log_call(
        &mut self,
        transaction: &Signed,
        result: &ExecutionResult,
    ) -> Result<(), LoggerError> {
        let _transaction = transaction;
        let _result = result;

        Ok(())
    }

    /// Logs a block that was mined by the interval miner.
    fn log_interval_mined(&mut self, block: &LocalBlock) -> Result<(), LoggerError> {
        let _block = block;

        Ok(())
    }

    /// Logs blocks that were mined on request.
    fn log_mined_block(&mut self, blocks: &[Arc<LocalBlock>]) -> Result<(), LoggerError> {
        let _blocks = blocks;

        Ok(())
    }

    /// Logs a sent transaction and the blocks that were auto-mined for it.
    fn log_send_transaction(
        &mut self,
        transaction: &Signed,
        mined_blocks: &[Arc<LocalBlock>],
    ) -> Result<(), LoggerError> {
        let _transaction = transaction;
        let _mined_blocks = mined_blocks;

        Ok(())
    }

    /// Prints the collected logs, which correspond to the method with the
    /// provided name.
    fn print_method_logs(
        &mut self,
        method: &str,
        error: Option<&ProviderError>,
    ) -> Result<(), LoggerError>;
}

/// A [`Logger`] that can be shared between threads.
pub trait SyncLogger: Logger + DynClone + Send + Sync {}

impl<LoggerT> SyncLogger for LoggerT where LoggerT: Logger + DynClone + Send + Sync {}

impl Clone for Box<dyn SyncLogger> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// A logger that does nothing.
#[derive(Clone, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn is_enabled(&self) -> bool {
        false
    }

    fn set_is_enabled(&mut self, _is_enabled: bool) {}

    fn print_method_logs(
        &mut self,
        _method: &str,
        _error: Option<&ProviderError>,
    ) -> Result<(), LoggerError> {
        Ok(())
    }
}

/// Prints a line, or replaces the last printed line when the flag is set.
pub trait PrintLineFn: Fn(String, bool) -> Result<(), LoggerError> + Send + Sync {}

impl<FnT> PrintLineFn for FnT where FnT: Fn(String, bool) -> Result<(), LoggerError> + Send + Sync {}

#[derive(Clone, Debug, Default)]
enum LoggingState {
    CollapsingMethod {
        method: String,
        count: usize,
    },
    HardhatMining {
        empty_blocks_range_start: Option<u64>,
    },
    IntervalMining {
        empty_blocks_range_start: Option<u64>,
    },
    #[default]
    Empty,
}

#[derive(Clone, Debug)]
enum LogLine {
    Single(String),
    WithTitle(String, String),
}

/// A console logger that collapses successive calls of the same method into a
/// single `method (N)` line.
#[derive(Clone)]
pub struct CollapsingLogger {
    is_enabled: bool,
    print_line_fn: Arc<dyn PrintLineFn>,
    indentation: usize,
    logs: Vec<LogLine>,
    state: LoggingState,
    title_length: usize,
}

impl CollapsingLogger {
    /// Constructs a logger that prints through the provided function.
    pub fn new(is_enabled: bool, print_line_fn: Arc<dyn PrintLineFn>) -> Self {
        Self {
            is_enabled,
            print_line_fn,
            indentation: 0,
            logs: Vec::new(),
            state: LoggingState::default(),
            title_length: 0,
        }
    }

    fn format(&self, message: impl ToString) -> String {
        let message = message.to_string();

        if message.is_empty() {
            message
        } else {
            message
                .split('\n')
                .map(|line| format!("{:indent$}{line}", "", indent = self.indentation))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    fn indented(&mut self, display_fn: impl FnOnce(&mut Self)) {
        self.indentation += 2;
        display_fn(self);
        self.indentation -= 2;
    }

    fn log(&mut self, message: impl ToString) {
        let formatted = self.format(message);
        self.logs.push(LogLine::Single(formatted));
    }

    fn log_empty_line(&mut self) {
        self.log("");
    }

    fn log_with_title(&mut self, title: impl Into<String>, message: impl ToString) {
        let title = self.format(title.into());
        self.title_length = self.title_length.max(title.len());

        self.logs
            .push(LogLine::WithTitle(title, message.to_string()));
    }

    fn log_transaction_failure(&mut self, failure: &TransactionFailure) {
        let error_type = if matches!(failure.reason, TransactionFailureReason::Revert(_)) {
            "Error"
        } else {
            "TransactionExecutionError"
        };

        self.log_empty_line();
        self.log(format!("{error_type}: {failure}"));
    }

    fn log_transaction(&mut self, executed: &ExecutedTransaction, highlight: Option<&B256>) {
        let ExecutedTransaction {
            transaction,
            result,
            ..
        } = executed;

        let transaction_hash = transaction.hash();
        if highlight == Some(transaction_hash) {
            self.log_with_title("Transaction", format!("{transaction_hash} (sent)"));
        } else {
            self.log_with_title("Transaction", transaction_hash);
        }

        self.indented(|logger| {
            logger.log_with_title("From", format!("0x{:x}", transaction.caller()));
            if let Some(to) = transaction.kind().to() {
                logger.log_with_title("To", format!("0x{to:x}"));
            }
            logger.log_with_title("Value", wei_to_human_readable(&transaction.value()));
            logger.log_with_title(
                "Gas used",
                format!(
                    "{gas_used} of {gas_limit}",
                    gas_used = result.gas_used(),
                    gas_limit = transaction.gas_limit()
                ),
            );

            if let Some(failure) =
                TransactionFailure::from_execution_result(result, Some(transaction_hash))
            {
                logger.log_transaction_failure(&failure);
            }
        });
    }

    fn log_block(&mut self, block: &LocalBlock, highlight: Option<&B256>) {
        self.log(format!("Block #{}: {}", block.header.number, block.hash));

        self.indented(|logger| {
            if let Some(base_fee) = block.header.base_fee_per_gas {
                logger.log(format!("Base fee: {base_fee}"));
            }

            let num_transactions = block.transactions.len();
            for (index, executed) in block.transactions.iter().enumerate() {
                logger.log_transaction(executed, highlight);

                if index + 1 < num_transactions {
                    logger.log_empty_line();
                }
            }
        });
    }

    fn print<const REPLACE: bool>(&mut self, message: impl ToString) -> Result<(), LoggerError> {
        if !self.is_enabled {
            return Ok(());
        }

        let formatted = self.format(message);
        (self.print_line_fn)(formatted, REPLACE)
    }

    fn print_empty_line(&mut self) -> Result<(), LoggerError> {
        self.print::<false>("")
    }

    fn print_logs(&mut self) -> Result<bool, LoggerError> {
        let logs = std::mem::take(&mut self.logs);
        if logs.is_empty() {
            return Ok(false);
        }

        for log in logs {
            let line = match log {
                LogLine::Single(message) => message,
                LogLine::WithTitle(title, message) => {
                    let title = format!("{title}:");
                    format!("{title:indent$} {message}", indent = self.title_length + 1)
                }
            };

            self.print::<false>(line)?;
        }

        self.title_length = 0;
        Ok(true)
    }

    fn print_method(&mut self, method: &str) -> Result<(), LoggerError> {
        let collapsed_count = match &mut self.state {
            LoggingState::CollapsingMethod {
                method: collapsed,
                count,
            } if collapsed == method => {
                *count += 1;
                Some(*count)
            }
            _ => None,
        };

        if let Some(count) = collapsed_count {
            self.print::<true>(format!("{method} ({count})"))
        } else {
            self.state = LoggingState::CollapsingMethod {
                method: method.to_owned(),
                count: 1,
            };
            self.print::<false>(method)
        }
    }
}

impl Logger for CollapsingLogger {
    fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    fn set_is_enabled(&mut self, is_enabled: bool) {
        self.is_enabled = is_enabled;
    }

    fn log_call(
        &mut self,
        transaction: &Signed,
        result: &ExecutionResult,
    ) -> Result<(), LoggerError> {
        self.state = LoggingState::Empty;

        self.indented(|logger| {
            logger.log_with_title("From", format!("0x{:x}", transaction.caller()));
            if let Some(to) = transaction.kind().to() {
                logger.log_with_title("To", format!("0x{to:x}"));
            }
            if transaction.value() > U256::ZERO {
                logger.log_with_title("Value", wei_to_human_readable(&transaction.value()));
            }

            if let Some(failure) = TransactionFailure::from_execution_result(result, None) {
                logger.log_transaction_failure(&failure);
            }
        });

        Ok(())
    }

    fn log_interval_mined(&mut self, block: &LocalBlock) -> Result<(), LoggerError> {
        let block_number = block.header.number;

        if block.transactions.is_empty() {
            let empty_blocks_range_start = match std::mem::take(&mut self.state) {
                LoggingState::IntervalMining {
                    empty_blocks_range_start,
                } => empty_blocks_range_start,
                _ => None,
            };

            if let Some(range_start) = empty_blocks_range_start {
                self.print::<true>(format!(
                    "Mined empty block range #{range_start} to #{block_number}"
                ))?;
            } else {
                let base_fee = block
                    .header
                    .base_fee_per_gas
                    .map(|base_fee| format!(" with base fee {base_fee}"))
                    .unwrap_or_default();

                self.print::<false>(format!("Mined empty block #{block_number}{base_fee}"))?;
            }

            self.state = LoggingState::IntervalMining {
                empty_blocks_range_start: Some(empty_blocks_range_start.unwrap_or(block_number)),
            };
        } else {
            self.state = LoggingState::Empty;
            self.indented(|logger| logger.log_block(block, None));

            self.print::<false>(format!("Mined block #{block_number}"))?;
            if self.print_logs()? {
                self.print_empty_line()?;
            }
        }

        Ok(())
    }

    fn log_mined_block(&mut self, blocks: &[Arc<LocalBlock>]) -> Result<(), LoggerError> {
        let num_blocks = blocks.len();
        for (index, block) in blocks.iter().enumerate() {
            let empty_blocks_range_start = match std::mem::take(&mut self.state) {
                LoggingState::HardhatMining {
                    empty_blocks_range_start,
                } => empty_blocks_range_start,
                _ => None,
            };

            let block_number = block.header.number;
            if block.transactions.is_empty() {
                if let Some(range_start) = empty_blocks_range_start {
                    if let Some(LogLine::Single(last)) = self.logs.last_mut() {
                        *last = format!("Mined empty block range #{range_start} to #{block_number}");
                    }
                } else {
                    self.log(format!("Mined empty block #{block_number}"));
                }

                self.state = LoggingState::HardhatMining {
                    empty_blocks_range_start: Some(
                        empty_blocks_range_start.unwrap_or(block_number),
                    ),
                };
            } else {
                self.indented(|logger| logger.log_block(block, None));

                if index + 1 < num_blocks {
                    self.log_empty_line();
                }
            }
        }

        Ok(())
    }

    fn log_send_transaction(
        &mut self,
        transaction: &Signed,
        mined_blocks: &[Arc<LocalBlock>],
    ) -> Result<(), LoggerError> {
        if mined_blocks.is_empty() {
            return Ok(());
        }

        self.state = LoggingState::Empty;

        let is_only_transaction = mined_blocks.len() == 1
            && mined_blocks
                .first()
                .is_some_and(|block| block.transactions.len() == 1);

        if is_only_transaction {
            if let Some(block) = mined_blocks.first() {
                self.indented(|logger| {
                    for executed in &block.transactions {
                        logger.log_transaction(executed, None);
                    }
                    logger.log_with_title("Block", format!("#{} {}", block.header.number, block.hash));
                });
            }
        } else {
            self.indented(|logger| {
                logger.log("There were other pending transactions mined in the same block:");
                logger.log_empty_line();
            });

            for block in mined_blocks {
                self.indented(|logger| logger.log_block(block, Some(transaction.hash())));
                self.log_empty_line();
            }
        }

        Ok(())
    }

    fn print_method_logs(
        &mut self,
        method: &str,
        error: Option<&ProviderError>,
    ) -> Result<(), LoggerError> {
        if let Some(error) = error {
            self.state = LoggingState::Empty;

            if matches!(error, ProviderError::UnsupportedMethod { .. }) {
                self.print::<false>(error)?;
            } else {
                self.print::<false>(method)?;
                self.print_logs()?;

                if !matches!(error, ProviderError::TransactionFailed(_)) {
                    self.print_empty_line()?;

                    self.indentation += 2;
                    let printed = self.print::<false>(error);
                    self.indentation -= 2;
                    printed?;
                }

                self.print_empty_line()?;
            }
        } else {
            self.print_method(method)?;

            if self.print_logs()? {
                self.print_empty_line()?;
            }
        }

        Ok(())
    }
}

fn wei_to_human_readable(wei: &U256) -> String {
    if *wei == U256::ZERO {
        "0 ETH".to_owned()
    } else if *wei < U256::from(100_000u64) {
        format!("{wei} wei")
    } else if *wei < U256::from(100_000_000_000_000u64) {
        format!("{} gwei", to_decimal_string(wei, 9))
    } else {
        format!("{} ETH", to_decimal_string(wei, 18))
    }
}

/// Divides `value` by `10^exponent` and formats it with at most four decimals.
fn to_decimal_string(value: &U256, exponent: u8) -> String {
    const MAX_DECIMALS: u8 = 4;

    let (integer, remainder) = value.div_rem(U256::from(10).pow(U256::from(exponent)));
    let decimal = remainder / U256::from(10).pow(U256::from(exponent - MAX_DECIMALS));

    let decimal = format!("{:0>width$}", decimal.to_string(), width = usize::from(MAX_DECIMALS));
    let decimal = decimal.trim_end_matches('0');
    if decimal.is_empty() {
        integer.to_string()
    } else {
        format!("{integer}.{decimal}")
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    fn recording_logger() -> (CollapsingLogger, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let logger = CollapsingLogger::new(
            true,
            Arc::new(move |line: String, replace: bool| {
                let mut lines = sink.lock();
                if replace {
                    lines.pop();
                }
                lines.push(line);
                Ok(())
            }),
        );

        (logger, lines)
    }

    #[test]
    fn collapses_successive_identical_methods() -> anyhow::Result<()> {
        let (mut logger, lines) = recording_logger();

        logger.print_method_logs("eth_blockNumber", None)?;
        logger.print_method_logs("eth_blockNumber", None)?;
        logger.print_method_logs("eth_blockNumber", None)?;
        logger.print_method_logs("eth_chainId", None)?;
        logger.print_method_logs("eth_blockNumber", None)?;

        assert_eq!(
            *lines.lock(),
            vec!["eth_blockNumber (3)", "eth_chainId", "eth_blockNumber"]
        );

        Ok(())
    }

    #[test]
    fn errors_break_collapsing() -> anyhow::Result<()> {
        let (mut logger, lines) = recording_logger();

        let error = ProviderError::UnsupportedMethod {
            method_name: "eth_mining".to_owned(),
        };

        logger.print_method_logs("eth_accounts", None)?;
        logger.print_method_logs("eth_mining", Some(&error))?;
        logger.print_method_logs("eth_accounts", None)?;

        assert_eq!(
            *lines.lock(),
            vec![
                "eth_accounts",
                "eth_mining - Method not supported",
                "eth_accounts"
            ]
        );

        Ok(())
    }

    #[test]
    fn disabled_logger_prints_nothing() -> anyhow::Result<()> {
        let (mut logger, lines) = recording_logger();
        logger.set_is_enabled(false);

        logger.print_method_logs("eth_accounts", None)?;
        assert!(lines.lock().is_empty());

        Ok(())
    }

    #[test]
    fn human_readable_wei() {
        assert_eq!(wei_to_human_readable(&U256::ZERO), "0 ETH");
        assert_eq!(wei_to_human_readable(&U256::from(1)), "1 wei");
        assert_eq!(
            wei_to_human_readable(&U256::from(1_500_000_000u64)),
            "1.5 gwei"
        );
        assert_eq!(
            wei_to_human_readable(&U256::from(1_050_000_000u64)),
            "1.05 gwei"
        );
        assert_eq!(
            wei_to_human_readable(&U256::from(2_000_000_000_000_000_000u128)),
            "2 ETH"
        );
    }
}
