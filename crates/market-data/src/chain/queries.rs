//! GraphQL documents sent to the Kadena indexer

pub const GET_BLOCK: &str = r"
query GetBlock($hash: String!) {
  block(hash: $hash) {
    hash
    height
    minerAccount { accountName }
    transactions { edges { node { id hash } } }
    events { edges { node { id qualifiedName } } }
    creationTime
  }
}";

const BLOCK_PAGE_FIELDS: &str = "
    edges {
      node {
        hash
        height
        minerAccount { accountName }
        transactions { edges { node { id hash } } }
        creationTime
      }
    }
    pageInfo { hasNextPage hasPreviousPage endCursor }";

pub fn blocks_from_depth() -> String {
    format!(
        "query GetBlocksFromDepth($minimumDepth: Int!, $first: Int) {{
  blocksFromDepth(minimumDepth: $minimumDepth, first: $first) {{{BLOCK_PAGE_FIELDS}
  }}
}}"
    )
}

pub fn blocks_from_height() -> String {
    format!(
        "query GetBlocksFromHeight($startHeight: Int!, $first: Int) {{
  blocksFromHeight(startHeight: $startHeight, first: $first) {{{BLOCK_PAGE_FIELDS}
  }}
}}"
    )
}

const TRANSACTION_PAGE_FIELDS: &str = "
    edges {
      node {
        hash
        cmd { meta { chainId gasPrice sender } }
        result { ... on TransactionResult { gas gasUsed } }
        block { height hash }
        creationTime
      }
    }
    pageInfo { hasNextPage endCursor }";

pub fn transactions() -> String {
    format!(
        "query GetTransactions(
  $accountName: String
  $blockHash: String
  $chainId: String
  $requestKey: String
  $first: Int
  $after: String
  $maxHeight: Int
  $minHeight: Int
  $minimumDepth: Int
) {{
  transactions(
    accountName: $accountName
    blockHash: $blockHash
    chainId: $chainId
    requestKey: $requestKey
    first: $first
    after: $after
    maxHeight: $maxHeight
    minHeight: $minHeight
    minimumDepth: $minimumDepth
  ) {{{TRANSACTION_PAGE_FIELDS}
  }}
}}"
    )
}

pub fn transactions_by_public_key() -> String {
    format!(
        "query GetTransactionsByPublicKey($publicKey: String!, $first: Int, $after: String) {{
  transactionsByPublicKey(publicKey: $publicKey, first: $first, after: $after) {{{TRANSACTION_PAGE_FIELDS}
  }}
}}"
    )
}

pub const GET_TRANSFERS: &str = r"
query GetTransfers($accountName: String!, $chainId: String!, $first: Int, $after: String) {
  transfers(accountName: $accountName, chainId: $chainId, first: $first, after: $after) {
    edges {
      node {
        amount
        block { height hash }
        creationTime
        receiverAccount
        senderAccount
        transaction { hash }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}";

pub const GET_EVENTS: &str = r"
query GetEvents(
  $accountName: String
  $blockHash: String
  $chainId: String
  $first: Int
  $after: String
  $maxHeight: Int
  $minHeight: Int
  $minimumDepth: Int
  $qualifiedName: String
  $pactId: String
) {
  events(
    accountName: $accountName
    blockHash: $blockHash
    chainId: $chainId
    first: $first
    after: $after
    maxHeight: $maxHeight
    minHeight: $minHeight
    minimumDepth: $minimumDepth
    qualifiedName: $qualifiedName
    pactId: $pactId
  ) {
    edges {
      node {
        id
        qualifiedName
        name
        moduleHash
        module { name }
        params
        block { height hash }
        transaction { hash }
        creationTime
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}";

const TOKEN_FIELDS: &str = "token { id name fungible { supply decimals } }";

pub fn fungible_account() -> String {
    format!(
        "query GetFungibleAccount($accountName: String!, $chainId: String!) {{
  fungibleAccount(accountName: $accountName, chainId: $chainId) {{
    accountName
    account {{ guard {{ keySet {{ keys pred }} }} }}
    chainId
    balances {{ edges {{ node {{ amount {TOKEN_FIELDS} }} }} }}
    tokens {{ edges {{ node {{ {TOKEN_FIELDS} }} }} }}
  }}
}}"
    )
}

pub fn fungible_accounts_by_public_key() -> String {
    format!(
        "query GetFungibleAccountByPublicKey($publicKey: String!, $chainId: String!, $first: Int, $after: String) {{
  fungibleAccountsByPublicKey(publicKey: $publicKey, chainId: $chainId, first: $first, after: $after) {{
    edges {{
      node {{
        accountName
        account {{ guard {{ keySet {{ keys pred }} }} }}
        chainId
        balances {{ edges {{ node {{ amount {TOKEN_FIELDS} }} }} }}
      }}
    }}
    pageInfo {{ hasNextPage endCursor }}
  }}
}}"
    )
}
