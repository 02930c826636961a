//! 크기 제한 워커 풀.
//!
//! `Semaphore`로 동시 실행 수를 제한하고 `JoinSet`으로 태스크를 모읍니다.
//! 한 태스크가 실패하면 토큰을 취소해 아직 시작하지 않은 작업을 막고,
//! 이미 실행 중인 태스크는 끝까지 기다립니다.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{CollectorError, Result};

/// 항목마다 `task`를 최대 `workers`개씩 병렬 실행.
///
/// # Returns
/// 성공한 태스크 결과 (완료 순서). 실패가 있으면 첫 번째 에러.
pub async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    workers: usize,
    token: CancellationToken,
    task: F,
) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut set = JoinSet::new();

    for item in items {
        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => {
                permit.map_err(|e| CollectorError::Pool(e.to_string()))?
            }
        };
        // 실패한 태스크는 permit 반환 전에 취소하므로 여기서 다시 확인
        if token.is_cancelled() {
            break;
        }

        let fut = task(item);
        let token = token.clone();
        set.spawn(async move {
            let result = fut.await;
            if result.is_err() {
                token.cancel();
            }
            drop(permit);
            result
        });
    }

    let mut results = Vec::new();
    let mut first_error: Option<CollectorError> = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(join_err) => {
                token.cancel();
                first_error.get_or_insert(CollectorError::Pool(join_err.to_string()));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None if token.is_cancelled() => Err(CollectorError::Pool("작업이 취소되었습니다".to_string())),
        None => Ok(results),
    }
}
