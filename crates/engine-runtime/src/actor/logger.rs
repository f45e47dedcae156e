use crate::{
    actor::{
        actor::{Actor, ActorContext, ActorRef},
        messages::{JobMsg, LoggerMsg},
    },
    error::ActorError,
};
use async_trait::async_trait;
use engine_processing::bad_records::{BadRecordSink, FailedRowWriter};
use model::records::record::Record;
use tracing::{error, info, warn};

/// Writes failed records in arrival order and reports back once on `End`.
///
/// Without a writer, failed records only go to the log.
pub struct BadRecordActor {
    writer: Option<FailedRowWriter>,
    job: ActorRef<JobMsg>,
    written: u64,
    write_failures: u64,
    ended: bool,
}

impl BadRecordActor {
    pub fn new(writer: Option<FailedRowWriter>, job: ActorRef<JobMsg>) -> Self {
        Self {
            writer,
            job,
            written: 0,
            write_failures: 0,
            ended: false,
        }
    }

    async fn log(&mut self, record: Record) {
        let Some(writer) = self.writer.as_mut() else {
            warn!(
                record_id = record.id,
                error = ?record.error().map(|e| e.to_string()),
                line = ?record.raw_line(),
                "Bad record"
            );
            return;
        };

        match writer.write(&record).await {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.write_failures += 1;
                error!(record_id = record.id, error = %e, "Failed to write bad record");
            }
        }
    }

    async fn finish(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush().await {
                error!(actor = ctx.name(), error = %e, "Failed to flush bad record log");
            }
            info!(
                actor = ctx.name(),
                path = %writer.path().display(),
                written = self.written,
                "Bad record log closed"
            );
        }

        self.ended = true;
        self.job.send(JobMsg::LoggerFinished {
            written: self.written,
            write_failures: self.write_failures,
        })
    }
}

#[async_trait]
impl Actor<LoggerMsg> for BadRecordActor {
    async fn handle(&mut self, msg: LoggerMsg, ctx: &ActorContext) -> Result<(), ActorError> {
        match msg {
            LoggerMsg::Log(record) if self.ended => {
                warn!(actor = ctx.name(), record_id = record.id, "Bad record after end, dropping");
            }
            LoggerMsg::Log(record) => self.log(record).await,
            LoggerMsg::End if self.ended => {}
            LoggerMsg::End => self.finish(ctx).await?,
        }
        Ok(())
    }

    async fn on_stop(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        if !self.ended {
            warn!(actor = ctx.name(), "Bad record log dropped before end");
        }
        Ok(())
    }
}

/// The controller's side of the bad record logger.
pub struct BadRecordHandle {
    logger: ActorRef<LoggerMsg>,
    job: ActorRef<JobMsg>,
}

impl BadRecordHandle {
    pub fn new(logger: ActorRef<LoggerMsg>, job: ActorRef<JobMsg>) -> Self {
        Self { logger, job }
    }
}

impl BadRecordSink for BadRecordHandle {
    fn log_record(&mut self, record: Record) {
        if let Err(e) = self.logger.send(LoggerMsg::Log(record)) {
            error!(actor = self.logger.name(), error = %e, "Bad record lost");
        }
    }

    fn end(&mut self) {
        if self.logger.send(LoggerMsg::End).is_err() {
            // The logger is gone; finish the job anyway.
            error!(actor = self.logger.name(), "Bad record log unavailable at shutdown");
            let _ = self.job.send(JobMsg::LoggerFinished {
                written: 0,
                write_failures: 0,
            });
        }
    }
}
